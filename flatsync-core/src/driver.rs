//! One full run: fetch every server's tree, sync the servers in order,
//! reap once, notify.

use std::fmt;
use std::sync::Arc;

use flatsync_model::{
    FieldAvailability, RemoteServerData, ServerConfig, ServerId,
};
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::availability::FieldAvailabilityBuilder;
use crate::error::{Result, SyncError};
use crate::notify::{DeliveryCounts, NotificationSink};
use crate::reaper::{AvailabilityReaper, ReapReport};
use crate::remote::{CATALOG_PATH, RemoteServerClient};
use crate::sync::{SyncEngine, SyncReport};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOutcome {
    pub server_id: ServerId,
    #[serde(serialize_with = "serialize_outcome")]
    pub result: std::result::Result<SyncReport, String>,
}

fn serialize_outcome<S: serde::Serializer>(
    result: &std::result::Result<SyncReport, String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(1))?;
    match result {
        Ok(report) => map.serialize_entry("report", report)?,
        Err(message) => map.serialize_entry("error", message)?,
    }
    map.end()
}

impl ServerOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        self.result.as_ref().ok()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverReport {
    pub servers: Vec<ServerOutcome>,
    /// `None` when the reaper was skipped.
    pub reap: Option<ReapReport>,
    pub notifications: Option<DeliveryCounts>,
}

impl DriverReport {
    pub fn failed_servers(&self) -> impl Iterator<Item = &ServerOutcome> {
        self.servers.iter().filter(|outcome| outcome.result.is_err())
    }

    pub fn reports(&self) -> Vec<SyncReport> {
        self.servers
            .iter()
            .filter_map(|outcome| outcome.report().cloned())
            .collect()
    }
}

pub struct SyncDriver {
    engine: SyncEngine,
    reaper: AvailabilityReaper,
    client: Arc<dyn RemoteServerClient>,
    notifier: Arc<dyn NotificationSink>,
    skip_reaper: bool,
}

impl fmt::Debug for SyncDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncDriver")
            .field("engine", &self.engine)
            .field("skip_reaper", &self.skip_reaper)
            .finish()
    }
}

impl SyncDriver {
    pub fn new(
        engine: SyncEngine,
        reaper: AvailabilityReaper,
        client: Arc<dyn RemoteServerClient>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            engine,
            reaper,
            client,
            notifier,
            skip_reaper: false,
        }
    }

    pub fn with_skip_reaper(mut self, skip: bool) -> Self {
        self.skip_reaper = skip;
        self
    }

    /// Servers sync in the order given. The reaper only runs when every
    /// server delivered its tree, so an unreachable server never causes its
    /// content to be deleted.
    #[instrument(skip_all, fields(servers = servers.len()))]
    pub async fn run(
        &self,
        servers: &[ServerConfig],
        availability: Option<FieldAvailability>,
    ) -> DriverReport {
        let fetched = join_all(
            servers.iter().map(|server| self.fetch_catalog(server)),
        )
        .await;

        let mut report = DriverReport::default();
        let mut trees: Vec<(&ServerConfig, RemoteServerData)> = Vec::new();
        for (server, result) in servers.iter().zip(fetched) {
            match result {
                Ok(data) => trees.push((server, data)),
                Err(err) => {
                    error!(server = %server.id, error = %err, "catalog fetch failed");
                    report.servers.push(ServerOutcome {
                        server_id: server.id.clone(),
                        result: Err(err.to_string()),
                    });
                }
            }
        }
        let all_reported = trees.len() == servers.len();

        let availability = availability.unwrap_or_else(|| {
            trees
                .iter()
                .fold(FieldAvailabilityBuilder::new(), |builder, (server, data)| {
                    builder.add_server(server, data)
                })
                .build()
        });

        for (server, data) in &trees {
            let result = self
                .engine
                .sync_all(data, server, &availability)
                .await
                .map_err(|err| {
                    error!(server = %server.id, error = %err, "server sync failed");
                    err.to_string()
                });
            report.servers.push(ServerOutcome {
                server_id: server.id.clone(),
                result,
            });
        }

        if self.skip_reaper {
            info!("reaper skipped by request");
        } else if !all_reported || trees.is_empty() {
            warn!(
                reported = trees.len(),
                configured = servers.len(),
                "not every server reported; reaper skipped"
            );
        } else {
            let snapshot: Vec<(ServerId, RemoteServerData)> = trees
                .into_iter()
                .map(|(server, data)| (server.id.clone(), data))
                .collect();
            match self.reaper.reap_unavailable(&snapshot, &availability).await {
                Ok(reap) => report.reap = Some(reap),
                Err(err) => error!(error = %err, "availability reap failed"),
            }
        }

        let reports = report.reports();
        match self.notifier.deliver(&reports).await {
            Ok(counts) => report.notifications = Some(counts),
            Err(err) => warn!(error = %err, "notification delivery failed"),
        }
        report
    }

    async fn fetch_catalog(
        &self,
        server: &ServerConfig,
    ) -> Result<RemoteServerData> {
        server.validate()?;
        let value = self.client.fetch_json(server, CATALOG_PATH).await?;
        let data: RemoteServerData =
            serde_json::from_value(value).map_err(|err| {
                SyncError::InvalidData(format!(
                    "catalog from {} did not decode: {err}",
                    server.id
                ))
            })?;
        info!(
            server = %server.id,
            movies = data.movies.len(),
            shows = data.tv.len(),
            "catalog fetched"
        );
        Ok(data)
    }
}
