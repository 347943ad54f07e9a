//! Accounts and balances, in both provider-native and domain form.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::asset::validate_asset;
use super::connector::ConnectorId;
use crate::error::{EngineError, EngineResult};

/// Metadata key linking an object to the end user it belongs to
pub const PSU_ID_METADATA_KEY: &str = "psu_id";
/// Metadata key linking an object to the bank connection it came from
pub const CONNECTION_ID_METADATA_KEY: &str = "connection_id";

/// Account as returned by a provider plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PspAccount {
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub name: Option<String>,
    pub default_asset: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId {
    pub reference: String,
    pub connector_id: ConnectorId,
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connector_id, self.reference)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub connector_id: ConnectorId,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub account_type: AccountType,
    pub name: Option<String>,
    pub default_asset: Option<String>,
    pub metadata: HashMap<String, String>,
    pub raw: serde_json::Value,
}

impl Account {
    /// Translate a provider account into a domain account, rejecting bad provider data
    pub fn from_psp(
        psp: PspAccount,
        account_type: AccountType,
        connector_id: &ConnectorId,
    ) -> EngineResult<Self> {
        if psp.reference.trim().is_empty() {
            return Err(EngineError::validation("account reference is required"));
        }
        if let Some(asset) = &psp.default_asset {
            validate_asset(asset)?;
        }

        Ok(Self {
            id: AccountId {
                reference: psp.reference.clone(),
                connector_id: connector_id.clone(),
            },
            connector_id: connector_id.clone(),
            reference: psp.reference,
            created_at: psp.created_at,
            account_type,
            name: psp.name,
            default_asset: psp.default_asset,
            metadata: psp.metadata,
            raw: psp.raw,
        })
    }

    pub fn psu_id(&self) -> Option<Uuid> {
        self.metadata
            .get(PSU_ID_METADATA_KEY)
            .and_then(|v| Uuid::parse_str(v).ok())
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.metadata.get(CONNECTION_ID_METADATA_KEY).map(String::as_str)
    }

    pub fn to_psp(&self) -> PspAccount {
        PspAccount {
            reference: self.reference.clone(),
            created_at: self.created_at,
            name: self.name.clone(),
            default_asset: self.default_asset.clone(),
            metadata: self.metadata.clone(),
            raw: self.raw.clone(),
        }
    }
}

/// Balance as returned by a provider plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PspBalance {
    pub account_reference: String,
    pub created_at: DateTime<Utc>,
    pub amount: Decimal,
    pub asset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub asset: String,
    pub balance: Decimal,
}

impl Balance {
    pub fn from_psp(psp: PspBalance, connector_id: &ConnectorId) -> EngineResult<Self> {
        if psp.account_reference.trim().is_empty() {
            return Err(EngineError::validation("balance account reference is required"));
        }
        validate_asset(&psp.asset)?;

        Ok(Self {
            account_id: AccountId {
                reference: psp.account_reference,
                connector_id: connector_id.clone(),
            },
            created_at: psp.created_at,
            last_updated_at: psp.created_at,
            asset: psp.asset,
            balance: psp.amount,
        })
    }
}

/// Bank account details registered by a user, later created at a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub account_number: Option<String>,
    pub iban: Option<String>,
    pub swift_bic_code: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub related_accounts: Vec<BankAccountRelatedAccount>,
}

/// Provider account created from a bank account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccountRelatedAccount {
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psp_account(reference: &str, asset: Option<&str>) -> PspAccount {
        PspAccount {
            reference: reference.to_string(),
            created_at: Utc::now(),
            name: Some("main".to_string()),
            default_asset: asset.map(str::to_string),
            metadata: HashMap::new(),
            raw: serde_json::json!({"id": reference}),
        }
    }

    #[test]
    fn test_account_translation() {
        let connector_id = ConnectorId::new("dummypay");
        let account =
            Account::from_psp(psp_account("acc-1", Some("EUR/2")), AccountType::Internal, &connector_id)
                .unwrap();
        assert_eq!(account.id.reference, "acc-1");
        assert_eq!(account.connector_id, connector_id);
        assert_eq!(account.account_type, AccountType::Internal);
    }

    #[test]
    fn test_account_translation_rejects_bad_data() {
        let connector_id = ConnectorId::new("dummypay");
        let err = Account::from_psp(psp_account("", None), AccountType::External, &connector_id)
            .unwrap_err();
        assert!(!err.is_retryable());

        let err = Account::from_psp(psp_account("acc-2", Some("euro")), AccountType::External, &connector_id)
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_account_metadata_links() {
        let connector_id = ConnectorId::new("dummypay");
        let psu_id = Uuid::new_v4();
        let mut psp = psp_account("acc-3", None);
        psp.metadata.insert(PSU_ID_METADATA_KEY.to_string(), psu_id.to_string());
        psp.metadata.insert(CONNECTION_ID_METADATA_KEY.to_string(), "conn-1".to_string());

        let account = Account::from_psp(psp, AccountType::Internal, &connector_id).unwrap();
        assert_eq!(account.psu_id(), Some(psu_id));
        assert_eq!(account.connection_id(), Some("conn-1"));
    }
}
