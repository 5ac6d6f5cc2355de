use async_trait::async_trait;
use farewatch_shared::PriceTrend;

/// Outbound channel to the chat collaborator.
///
/// A `trend` asks the receiver to render a price chart next to the text.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(
        &self,
        user_id: i64,
        text: &str,
        trend: Option<PriceTrend>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
