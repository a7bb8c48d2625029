use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Contract type stored when the request leaves it blank.
pub const DEFAULT_CONTRACT_TYPE: &str = "bail";

const NOT_SPECIFIED: &str = "Not specified";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId(pub String);

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Pending,
    Active,
    Signed,
    Expired,
    Terminated,
    Cancelled,
    Closed,
    Archived,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Signed => "signed",
            Self::Expired => "expired",
            Self::Terminated => "terminated",
            Self::Cancelled => "cancelled",
            Self::Closed => "closed",
            Self::Archived => "archived",
        }
    }
}

/// Body of the contract generator endpoint. `parties` and `details` are free-form
/// objects filled by the web form, keyed in French or English.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractDraftRequest {
    #[serde(rename = "type", default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub parties: Value,
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: ContractId,
    pub contract_type: String,
    pub client_id: Option<String>,
    pub property_id: Option<String>,
    pub agency_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub value: f64,
    pub status: ContractStatus,
    pub terms: String,
    pub documents: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial update; the web editor sends the body as `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractUpdate {
    pub id: ContractId,
    #[serde(default, alias = "content")]
    pub terms: Option<String>,
    #[serde(default)]
    pub status: Option<ContractStatus>,
}

impl ContractUpdate {
    pub fn is_empty(&self) -> bool {
        self.terms.is_none() && self.status.is_none()
    }
}

/// Fields resolved from a draft request before anything is generated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDraft {
    pub contract_type: String,
    pub client_id: Option<String>,
    pub property_id: Option<String>,
    pub agency_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("invalid {field} '{value}', expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },
}

impl ContractDraftRequest {
    pub fn prompt(&self) -> String {
        format!(
            "Génère un contrat de type \"{}\" entre les parties suivantes : {}. Détails : {}. \
             Le contrat doit être conforme à la législation du pays suivant : {}.",
            self.contract_type.as_deref().unwrap_or(DEFAULT_CONTRACT_TYPE),
            self.parties,
            self.details,
            self.jurisdiction.as_deref().unwrap_or("non précisée"),
        )
    }

    /// Ids, dates and value, preferring top-level fields over nested form data.
    pub fn resolve(&self, today: NaiveDate) -> Result<ResolvedDraft, DraftError> {
        let property_id = non_blank(self.property_id.as_deref())
            .or_else(|| text_at(&self.details, &["property_id"]))
            .or_else(|| text_at(&self.details, &["propriete", "id"]));
        let client_id = non_blank(self.client_id.as_deref())
            .or_else(|| text_at(&self.parties, &["tenant_id"]))
            .or_else(|| text_at(&self.parties, &["client_id"]));

        let start_raw = non_blank(self.start_date.as_deref())
            .or_else(|| text_at(&self.details, &["start_date"]))
            .or_else(|| text_at(&self.details, &["date_debut"]));
        let start_date = match start_raw {
            Some(raw) => parse_date("start_date", &raw)?,
            None => today,
        };

        let end_raw = non_blank(self.end_date.as_deref())
            .or_else(|| text_at(&self.details, &["end_date"]))
            .or_else(|| text_at(&self.details, &["date_fin"]));
        let end_date = end_raw
            .map(|raw| parse_date("end_date", &raw))
            .transpose()?;

        let value = ["monthly_rent", "loyer_mensuel", "amount"]
            .iter()
            .find_map(|key| number_at(&self.details, key))
            .unwrap_or(0.0);

        Ok(ResolvedDraft {
            contract_type: non_blank(self.contract_type.as_deref())
                .unwrap_or_else(|| DEFAULT_CONTRACT_TYPE.to_string()),
            client_id,
            property_id,
            agency_id: non_blank(self.agency_id.as_deref()),
            start_date,
            end_date,
            value,
        })
    }

    /// Human-readable header placed above the generated text.
    pub fn summary_html(&self, draft: &ResolvedDraft) -> String {
        let tenant = |field: &str| {
            text_at(&self.parties, &["locataire", field])
                .or_else(|| text_at(&self.parties, &["client", field]))
        };
        let agency = |field: &str| text_at(&self.parties, &["agence", field]);
        let detail = |field: &str| text_at(&self.details, &[field]);

        let agency_line = format!(
            "<strong>Nom</strong>: {} <strong>Adresse e-mail</strong>: {} <strong>Téléphone</strong>: {} \
             <strong>Site web</strong>: {} <strong>Adresse</strong>: {} <strong>Description</strong>: {}",
            shown(agency("nom")),
            shown(agency("email")),
            shown(agency("telephone")),
            shown(agency("site_web")),
            shown(agency("adresse")),
            shown(agency("description")),
        );

        let property_title = text_at(&self.details, &["propriete", "titre"])
            .or_else(|| detail("property_title"));
        let rent = detail("loyer_mensuel")
            .or_else(|| detail("monthly_rent"))
            .or_else(|| Some(format_amount(draft.value)));

        let mut html = String::new();
        html.push_str("<h3 style=\"margin:12px 0\">Locataire</h3>\n");
        html.push_str(&format!(
            "<p><strong>Nom</strong>: {} <strong>Prénom</strong>: {} <strong>Adresse e-mail</strong>: {} \
             <strong>Téléphone</strong>: {} <strong>Profession</strong>: {}</p>\n\n",
            shown(tenant("nom")),
            shown(tenant("prenom")),
            shown(tenant("email")),
            shown(tenant("telephone")),
            shown(tenant("profession")),
        ));
        html.push_str("<h3 style=\"margin:12px 0\">Agence</h3>\n");
        html.push_str(&format!("<p>{agency_line}</p>\n\n"));
        // Owner details are captured through the agency form.
        html.push_str("<h3 style=\"margin:12px 0\">Propriétaire</h3>\n");
        html.push_str(&format!("<p>{agency_line}</p>\n\n"));
        html.push_str("<h3 style=\"margin:12px 0\">Détails du contrat</h3>\n");
        html.push_str(&format!(
            "<p><strong>Titre de la propriété</strong>: {} <strong>Loyer mensuel</strong>: {} FCFA \
             <strong>Caution</strong>: {} FCFA <strong>Date de début</strong>: {} \
             <strong>Date de fin</strong>: {} <strong>Jour de paiement</strong>: {} \
             <strong>Fréquence</strong>: {} <strong>Conditions spéciales</strong>: {}</p>\n\n",
            shown(property_title),
            shown(rent),
            shown(detail("caution")),
            draft.start_date,
            shown(draft.end_date.map(|date| date.to_string())),
            shown(detail("jour_paiement")),
            shown(detail("frequence_paiement")),
            shown(detail("conditions_speciales")),
        ));
        html.push_str("<hr style=\"margin:16px 0\"/>");
        html
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Scalar at `path` rendered as text; empty strings and non-scalars are absent.
fn text_at(root: &Value, path: &[&str]) -> Option<String> {
    let mut current = root;
    for key in path {
        current = current.as_object().and_then(|map| map.get(*key))?;
    }
    match current {
        Value::String(text) => non_blank(Some(text)),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Positive-or-zero number at `key`, accepting numeric strings. Zero counts as absent
/// so the next key is tried.
fn number_at(root: &Value, key: &str) -> Option<f64> {
    let value = root.get(key)?;
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (number.is_finite() && number != 0.0).then_some(number)
}

fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, DraftError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|stamp| stamp.date_naive()))
        .map_err(|_| DraftError::InvalidDate {
            field,
            value: raw.to_string(),
        })
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn shown(value: Option<String>) -> String {
    match value {
        Some(text) => escape_html(&text),
        None => NOT_SPECIFIED.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
