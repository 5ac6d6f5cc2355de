//! User-facing text, keyed by enum so a missing translation fails to compile.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Pt,
}

impl Language {
    /// Resolve a stored language code (`pt`, `pt-BR`, `en-US`...). Unknown codes fall back to English.
    pub fn from_code(code: &str) -> Self {
        let primary = code
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "pt" => Language::Pt,
            _ => Language::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    FlightAlertTitle,
    CarAlertTitle,
    PriceChanged,
    Increased,
    Decreased,
    NewPrice,
    PreviousPrice,
    NewLowestEver,
    NewHighestEver,
    ViewFlights,
    ViewCars,
    SetupPreview,
    SetupDone,
    SetupNothingMonitored,
    SetupNoPending,
    SetupDatePassed,
    SetupFailed,
}

/// Template for a key. Placeholders look like `{name}`.
pub fn text(lang: Language, key: MessageKey) -> &'static str {
    use MessageKey::*;
    match lang {
        Language::En => match key {
            FlightAlertTitle => "{icon} Price update for your monitored trip!",
            CarAlertTitle => "{icon} Price update for your car rental!",
            PriceChanged => "The lowest price has {direction} by R$ {delta} ({percent}%)",
            Increased => "increased",
            Decreased => "decreased",
            NewPrice => "New price: R$ {price}",
            PreviousPrice => "Previous price: R$ {price}",
            NewLowestEver => "🏆 New lowest price ever!",
            NewHighestEver => "⚠️ New highest price ever!",
            ViewFlights => "[View flights on Google]({url})",
            ViewCars => "[View cars]({url})",
            SetupPreview => "I found flights for {date} from R$ {price}.\nWould you like to monitor nearby dates as well?",
            SetupDone => "✅ Monitoring {trips} trips across {dates} dates!\nI'll notify you when prices change.",
            SetupNothingMonitored => "Sorry, I couldn't set up monitoring for any of the dates. Please try again with a different date range.",
            SetupNoPending => "There is no monitor waiting for a date range. Please send the URL again.",
            SetupDatePassed => "The date of this search has already passed.",
            SetupFailed => "Sorry, there was an error processing the URL. Please make sure it's a valid Google Flights URL and try again.",
        },
        Language::Pt => match key {
            FlightAlertTitle => "{icon} Atualização de preço da sua viagem monitorada!",
            CarAlertTitle => "{icon} Atualização de preço do seu aluguel de carro!",
            PriceChanged => "O menor preço {direction} R$ {delta} ({percent}%)",
            Increased => "subiu",
            Decreased => "caiu",
            NewPrice => "Novo preço: R$ {price}",
            PreviousPrice => "Preço anterior: R$ {price}",
            NewLowestEver => "🏆 Novo menor preço histórico!",
            NewHighestEver => "⚠️ Novo maior preço histórico!",
            ViewFlights => "[Ver voos no Google]({url})",
            ViewCars => "[Ver carros]({url})",
            SetupPreview => "Encontrei voos para {date} a partir de R$ {price}.\nQuer monitorar datas próximas também?",
            SetupDone => "✅ Monitorando {trips} viagens em {dates} datas!\nVou avisar quando os preços mudarem.",
            SetupNothingMonitored => "Não consegui monitorar nenhuma das datas. Tente novamente com outro intervalo.",
            SetupNoPending => "Nenhum monitoramento aguardando intervalo de datas. Envie a URL novamente.",
            SetupDatePassed => "A data desta busca já passou.",
            SetupFailed => "Houve um erro ao processar a URL. Verifique se é uma URL válida do Google Flights e tente novamente.",
        },
    }
}

/// Fill `{name}` placeholders of a template
pub fn render(lang: Language, key: MessageKey, args: &[(&str, &str)]) -> String {
    args.iter()
        .fold(text(lang, key).to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
}

pub fn format_money(amount: f64) -> String {
    format!("{:.2}", amount)
}
