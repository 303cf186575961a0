use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::normalizer::{normalize_email, normalize_space};
use crate::workflows::claims::{OwnerContact, PropertyAddress};

/// One CSV row that survived validation: the property facts plus the
/// owner-of-record contact block captured for the claim email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportedProperty {
    pub(crate) address: PropertyAddress,
    pub(crate) asking_price: Option<u64>,
    pub(crate) contact: OwnerContact,
}

/// Row-level outcome; `line` is the 1-based line in the source file
/// (header on line 1).
#[derive(Debug)]
pub(crate) struct ParsedRow {
    pub(crate) line: u64,
    pub(crate) outcome: Result<ImportedProperty, RowIssue>,
}

/// Why a row was rejected. Recorded on the batch, never fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RowIssue {
    MissingAddress,
    MissingOwnerEmail,
    UnparseablePrice(String),
    Malformed(String),
}

impl std::fmt::Display for RowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowIssue::MissingAddress => write!(f, "row has no street address"),
            RowIssue::MissingOwnerEmail => write!(f, "row has no owner email"),
            RowIssue::UnparseablePrice(raw) => {
                write!(f, "price '{raw}' is not a dollar amount")
            }
            RowIssue::Malformed(detail) => write!(f, "row does not parse: {detail}"),
        }
    }
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<ParsedRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for (index, record) in csv_reader.deserialize::<PropertyRow>().enumerate() {
        let line = index as u64 + 2;
        let outcome = match record {
            Ok(row) => row.into_property(),
            Err(err) => Err(RowIssue::Malformed(err.to_string())),
        };
        rows.push(ParsedRow { line, outcome });
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct PropertyRow {
    #[serde(rename = "Address", default, deserialize_with = "empty_string_as_none")]
    address: Option<String>,
    #[serde(rename = "City", default, deserialize_with = "empty_string_as_none")]
    city: Option<String>,
    #[serde(rename = "State", default, deserialize_with = "empty_string_as_none")]
    state: Option<String>,
    #[serde(rename = "Zip", default, deserialize_with = "empty_string_as_none")]
    zip: Option<String>,
    #[serde(rename = "Price", default, deserialize_with = "empty_string_as_none")]
    price: Option<String>,
    #[serde(
        rename = "Owner Name",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    owner_name: Option<String>,
    #[serde(
        rename = "Owner Email",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    owner_email: Option<String>,
    #[serde(
        rename = "Owner Phone",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    owner_phone: Option<String>,
    #[serde(
        rename = "Owner Mailing Address",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    owner_mailing_address: Option<String>,
}

impl PropertyRow {
    fn into_property(self) -> Result<ImportedProperty, RowIssue> {
        let street = self
            .address
            .as_deref()
            .map(normalize_space)
            .filter(|street| !street.is_empty())
            .ok_or(RowIssue::MissingAddress)?;

        let owner_email = self
            .owner_email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or(RowIssue::MissingOwnerEmail)?;

        let asking_price = match self.price.as_deref() {
            None => None,
            Some(raw) => Some(parse_price(raw)?),
        };

        Ok(ImportedProperty {
            address: PropertyAddress {
                street,
                city: self.city.as_deref().map(normalize_space).unwrap_or_default(),
                state: self
                    .state
                    .as_deref()
                    .map(|state| normalize_space(state).to_ascii_uppercase())
                    .unwrap_or_default(),
                postal_code: self.zip.as_deref().map(normalize_space).unwrap_or_default(),
            },
            asking_price,
            contact: OwnerContact {
                name: self.owner_name.as_deref().map(normalize_space),
                email: Some(owner_email),
                phone: self.owner_phone.as_deref().map(normalize_space),
                mailing_address: self.owner_mailing_address.as_deref().map(normalize_space),
            },
        })
    }
}

fn parse_price(raw: &str) -> Result<u64, RowIssue> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    digits
        .parse::<u64>()
        .map_err(|_| RowIssue::UnparseablePrice(raw.to_string()))
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
