//! Credential strings for warehouse COPY and UNLOAD statements
//!
//! Redshift authenticates against S3 through a `CREDENTIALS` clause embedded
//! in the statement text, either as an IAM role ARN or as raw key material.
//! This module renders both forms and converts from SDK-provided credentials
//! so callers can source keys from the standard AWS provider chain.

use aws_credential_types::Credentials;

/// Credential material for a warehouse `CREDENTIALS` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedshiftCredentials {
    /// An IAM role the warehouse cluster is allowed to assume
    IamRole {
        account_id: String,
        role_name: String,
    },
    /// Access key material, with an optional STS session token
    Keys {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
}

impl RedshiftCredentials {
    /// Credentials referencing an IAM role by account and role name
    pub fn iam_role(account_id: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self::IamRole {
            account_id: account_id.into(),
            role_name: role_name.into(),
        }
    }

    /// Credentials from an access key pair
    pub fn keys(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self::Keys {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Credentials from an access key pair plus an STS session token
    pub fn keys_with_token(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self::Keys {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: Some(session_token.into()),
        }
    }

    /// Render the value of the `CREDENTIALS` clause
    pub fn credentials_string(&self) -> String {
        match self {
            Self::IamRole {
                account_id,
                role_name,
            } => {
                format!("aws_iam_role=arn:aws:iam::{account_id}:role/{role_name}")
            },
            Self::Keys {
                access_key_id,
                secret_access_key,
                session_token,
            } => {
                let mut value = format!(
                    "aws_access_key_id={access_key_id};aws_secret_access_key={secret_access_key}"
                );
                if let Some(token) = session_token {
                    value.push_str(";token=");
                    value.push_str(token);
                }
                value
            },
        }
    }
}

impl From<&Credentials> for RedshiftCredentials {
    fn from(creds: &Credentials) -> Self {
        Self::Keys {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().map(ToString::to_string),
        }
    }
}
