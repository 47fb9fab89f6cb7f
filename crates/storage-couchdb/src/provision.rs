//! First-run provisioning for CouchDB.
//!
//! Every call here authenticates as the server admin. The application user
//! configured for CRUD usually lacks the rights to create databases or write
//! `_security`.

use async_trait::async_trait;
use idp_storage::{
    BootstrapConfig, BootstrapError, Provisioner, StorageError, StorageResult,
    bootstrap::DesignOutcome,
};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::{
    backend::{CouchDbBackend, expect_success},
    design::{DESIGN_NAME, counts_design, design_matches, security_document},
    error::CouchDbError,
};

#[async_trait]
impl Provisioner for CouchDbBackend {
    fn preflight(&self, config: &BootstrapConfig) -> Result<(), BootstrapError> {
        if !self.config().has_admin_credentials() {
            return Err(BootstrapError::setup(
                "CouchDB admin_username and admin_password are required to provision the database",
            ));
        }
        if config.service_account().is_none() {
            return Err(BootstrapError::setup(
                "a service account is required to write the CouchDB security document",
            ));
        }
        Ok(())
    }

    async fn ensure_database(&self) -> StorageResult<bool> {
        let database = self.config().database();
        let url = self.url(&[])?;

        let probe =
            self.request(Method::HEAD, url.clone(), true).send().await.map_err(CouchDbError::from)?;
        match probe.status() {
            status if status.is_success() => return Ok(false),
            StatusCode::NOT_FOUND => {},
            // HEAD responses carry no error body.
            status => {
                return Err(CouchDbError::status(status, database, "database probe failed").into());
            },
        }

        let response =
            self.request(Method::PUT, url, true).send().await.map_err(CouchDbError::from)?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            // Created by a concurrent bootstrapper between HEAD and PUT.
            return Err(StorageError::already_exists(database));
        }
        expect_success(response, database).await?;
        tracing::info!(database, "created CouchDB database");
        Ok(true)
    }

    async fn ensure_security(&self, service_account: &str) -> StorageResult<()> {
        let response = self
            .request(Method::PUT, self.url(&["_security"])?, true)
            .json(&security_document(service_account))
            .send()
            .await
            .map_err(CouchDbError::from)?;
        expect_success(response, "_security").await?;
        tracing::debug!(service_account, "applied CouchDB security document");
        Ok(())
    }

    async fn ensure_design_documents(&self) -> StorageResult<DesignOutcome> {
        let segments = ["_design", DESIGN_NAME];
        let target = segments.join("/");
        let stored: Option<Value> = self.fetch(&segments, true).await?;

        let mut desired = counts_design();
        let outcome = match &stored {
            None => DesignOutcome::Created,
            Some(stored) if design_matches(stored) => return Ok(DesignOutcome::Unchanged),
            Some(stored) => {
                desired["_rev"] = stored.get("_rev").cloned().unwrap_or(Value::Null);
                DesignOutcome::Updated
            },
        };

        let response = self
            .request(Method::PUT, self.url(&segments)?, true)
            .json(&desired)
            .send()
            .await
            .map_err(CouchDbError::from)?;
        match response.status() {
            StatusCode::CONFLICT if outcome == DesignOutcome::Created => {
                Err(StorageError::already_exists(target))
            },
            StatusCode::CONFLICT => Err(StorageError::conflict(target)),
            _ => {
                expect_success(response, &target).await?;
                Ok(outcome)
            },
        }
    }
}
