//! Payment confirmation
//!
//! The confirmation page reads the transaction reference from its query
//! string, asks the gateway for the transaction status and only enables
//! the download for approved payments. The HTTP call belongs to the host;
//! everything else is here.

use serde::Deserialize;
use std::fmt;

/// Query parameters that may carry the transaction reference, by priority
pub const REFERENCE_PARAMS: [&str; 6] = [
    "reference",
    "transaction_id",
    "id",
    "transactionId",
    "reference_code",
    "codigo",
];

const STATUS_ENDPOINT: &str = "https://production.wompi.co/v1/transactions";

/// Transaction reference found in a query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRef {
    /// Parameter it was found under
    pub param: String,
    pub value: String,
}

/// Split a query string (`?a=1&b=2`) into decoded pairs
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// First non-empty reference parameter, in priority order
pub fn transaction_reference<'a, I>(params: I) -> Option<TransactionRef>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let params: Vec<(&str, &str)> = params.into_iter().collect();
    REFERENCE_PARAMS.iter().find_map(|name| {
        params
            .iter()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(key, value)| TransactionRef {
                param: key.to_string(),
                value: value.to_string(),
            })
    })
}

/// Status endpoint of a transaction
pub fn status_url(transaction_id: &str) -> String {
    format!("{STATUS_ENDPOINT}/{transaction_id}")
}

/// Gateway transaction status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Approved,
    Pending,
    Declined,
    Voided,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "APPROVED" => PaymentStatus::Approved,
            "PENDING" => PaymentStatus::Pending,
            "DECLINED" => PaymentStatus::Declined,
            "VOIDED" => PaymentStatus::Voided,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    /// Status from a gateway response body (`{"data": {"status": ...}}`)
    pub fn from_body(body: &str) -> Option<Self> {
        #[derive(Deserialize)]
        struct Envelope {
            data: Transaction,
        }
        #[derive(Deserialize)]
        struct Transaction {
            status: String,
        }

        serde_json::from_str::<Envelope>(body)
            .ok()
            .map(|envelope| Self::parse(&envelope.data.status))
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Approved => f.write_str("APPROVED"),
            PaymentStatus::Pending => f.write_str("PENDING"),
            PaymentStatus::Declined => f.write_str("DECLINED"),
            PaymentStatus::Voided => f.write_str("VOIDED"),
            PaymentStatus::Other(status) => f.write_str(status),
        }
    }
}

/// Screen shown on the confirmation page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationView {
    DownloadReady,
    Retry,
    PaymentFailed(PaymentStatus),
    ConnectionError,
    AccessDenied,
}

impl ConfirmationView {
    /// View for a status response; `Err` is a failed or non-2xx request
    pub fn from_response(response: std::result::Result<&str, String>) -> Self {
        let view = match response {
            Ok(body) => match PaymentStatus::from_body(body) {
                Some(PaymentStatus::Approved) => ConfirmationView::DownloadReady,
                Some(PaymentStatus::Pending) => ConfirmationView::Retry,
                Some(status) => ConfirmationView::PaymentFailed(status),
                None => ConfirmationView::ConnectionError,
            },
            Err(e) => {
                tracing::warn!(error = %e, "payment status check failed");
                ConfirmationView::ConnectionError
            }
        };
        tracing::debug!(?view, "confirmation view");
        view
    }

    pub fn download_enabled(&self) -> bool {
        matches!(self, ConfirmationView::DownloadReady)
    }

    pub fn title(&self) -> &'static str {
        match self {
            ConfirmationView::DownloadReady => "¡Pago Exitoso!",
            ConfirmationView::Retry => "Pago Pendiente",
            ConfirmationView::PaymentFailed(_) => "Pago no realizado",
            ConfirmationView::ConnectionError => "Error de Conexión",
            ConfirmationView::AccessDenied => "Acceso Denegado",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ConfirmationView::DownloadReady => {
                "Tu pago se ha confirmado. Ya puedes descargar tu documento.".to_string()
            }
            ConfirmationView::Retry => {
                "Tu pago aún se está procesando. Por favor espera unos segundos o recarga la página."
                    .to_string()
            }
            ConfirmationView::PaymentFailed(status) => {
                format!("La transacción fue {status}. Por favor intenta pagar nuevamente.")
            }
            ConfirmationView::ConnectionError => {
                "Hubo un problema al conectar con Wompi. Por favor recarga la página.".to_string()
            }
            ConfirmationView::AccessDenied => {
                "No se encontró un ID de transacción válido.".to_string()
            }
        }
    }
}
