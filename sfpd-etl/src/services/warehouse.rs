//! Warehouse loading through SQL templates
//!
//! Every template is rendered as a parameterized [`Statement`] and executed
//! on its own. There is no transaction spanning several inserts. A failing
//! statement is reported as [`EtlError::Load`] and the caller stops.

use crate::error::{EtlError, EtlResult};
use crate::models::{Incident, LocationLookup};
use async_trait::async_trait;
use sfpd_common::config::{WarehouseConfig, WarehouseCredentials};
use sfpd_common::{Statement, TemplateContext, TemplateRenderer};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::path::{Path, PathBuf};

pub const TEMPLATE_CREATE_LOCATIONS: &str = "create_locations.sql";
pub const TEMPLATE_CREATE_SFPD: &str = "create_sfpd.sql";
pub const TEMPLATE_INSERT_LOCATION: &str = "insert_location.sql";
pub const TEMPLATE_INSERT_SFPD: &str = "insert_sfpd.sql";

/// Templates shipped with the crate
pub fn default_sql_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/sql"))
}

/// Statement execution seam
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Execute one statement, returning the affected row count
    async fn execute(&self, statement: &Statement) -> EtlResult<u64>;
}

#[async_trait]
impl<W: Warehouse + ?Sized> Warehouse for std::sync::Arc<W> {
    async fn execute(&self, statement: &Statement) -> EtlResult<u64> {
        (**self).execute(statement).await
    }
}

/// Warehouse reached through sqlx's `Any` driver
///
/// `postgres://` URLs address the remote store; `sqlite:` URLs work for
/// local runs.
pub struct SqlxWarehouse {
    pool: AnyPool,
}

impl SqlxWarehouse {
    /// Validate credentials, then connect
    pub async fn connect(config: &WarehouseConfig) -> EtlResult<Self> {
        let credentials = config.credentials()?;
        let url = authenticated_url(&config.connection_url(), &credentials)?;

        tracing::info!(
            url = %config.connection_url(),
            user = %credentials.username,
            "Connecting to warehouse"
        );
        Self::connect_url(&url).await
    }

    /// Connect to a URL that already carries any credentials it needs
    pub async fn connect_url(url: &str) -> EtlResult<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| EtlError::Load(format!("connect failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

#[async_trait]
impl Warehouse for SqlxWarehouse {
    async fn execute(&self, statement: &Statement) -> EtlResult<u64> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = query.bind(param.clone());
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| EtlError::Load(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// Insert credentials into a URL with a host; host-less URLs pass through
fn authenticated_url(base: &str, credentials: &WarehouseCredentials) -> EtlResult<String> {
    let mut url = url::Url::parse(base).map_err(|e| {
        sfpd_common::Error::Config(format!("Invalid warehouse URL '{}': {}", base, e))
    })?;

    if url.has_host() {
        url.set_username(&credentials.username)
            .and_then(|_| url.set_password(Some(&credentials.password)))
            .map_err(|_| {
                sfpd_common::Error::Config(format!("Cannot set credentials on URL '{}'", base))
            })?;
    }

    Ok(url.to_string())
}

/// Renders the warehouse templates and runs them
pub struct WarehouseLoader<W> {
    warehouse: W,
    renderer: TemplateRenderer,
    sql_dir: PathBuf,
    locations_table: String,
    sfpd_table: String,
}

impl<W: Warehouse> WarehouseLoader<W> {
    pub fn new(
        warehouse: W,
        renderer: TemplateRenderer,
        sql_dir: PathBuf,
        config: &WarehouseConfig,
    ) -> Self {
        Self {
            warehouse,
            renderer,
            sql_dir,
            locations_table: config.locations_table.clone(),
            sfpd_table: config.sfpd_table.clone(),
        }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Render `template` (relative to the SQL directory) and execute it
    pub async fn run_script(&self, template: &Path, context: &TemplateContext) -> EtlResult<u64> {
        let path = self.sql_dir.join(template);
        let statement = self.renderer.render_statement(&path, context)?;

        tracing::debug!(
            template = %template.display(),
            sql = %statement.sql,
            params = statement.params.len(),
            "Running warehouse script"
        );

        self.warehouse.execute(&statement).await
    }

    /// Create both staging tables if they do not exist
    pub async fn create_schema(&self) -> EtlResult<()> {
        self.run_script(
            Path::new(TEMPLATE_CREATE_LOCATIONS),
            &table_context(&self.locations_table),
        )
        .await?;
        self.run_script(Path::new(TEMPLATE_CREATE_SFPD), &table_context(&self.sfpd_table))
            .await?;

        tracing::info!(
            locations = %self.locations_table,
            sfpd = %self.sfpd_table,
            "Warehouse schema ready"
        );
        Ok(())
    }

    pub async fn insert_location(&self, lookup: &LocationLookup) -> EtlResult<u64> {
        let mut context = table_context(&self.locations_table);
        context.insert("lng".to_string(), lookup.lng.to_string());
        context.insert("lat".to_string(), lookup.lat.to_string());
        context.insert("neighborhood".to_string(), lookup.neighborhood.clone());
        context.insert("xy".to_string(), format!("{};{}", lookup.lat, lookup.lng));

        self.run_script(Path::new(TEMPLATE_INSERT_LOCATION), &context).await
    }

    /// Insert the incident's properties verbatim
    pub async fn insert_incident(&self, incident: &Incident) -> EtlResult<u64> {
        let mut context = incident.to_context();
        context.insert("table".to_string(), self.sfpd_table.clone());

        self.run_script(Path::new(TEMPLATE_INSERT_SFPD), &context).await
    }
}

fn table_context(table: &str) -> TemplateContext {
    TemplateContext::from([("table".to_string(), table.to_string())])
}
