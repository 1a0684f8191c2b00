//! Renter service.
//!
//! Startup runs in a fixed order and either completes or leaves the renter
//! in [`RenterState::FailedToStart`] with nothing running:
//!
//! 1. compute the subscription range around this node's first id byte;
//!    a range that leaves the keyspace fails startup
//! 2. load recently seen contacts as seeds
//! 3. attach a consumer to every `work-x-NN` queue in the range
//! 4. join the network with the seeds
//! 5. start recording contacts the network reports
//!
//! Each consumer acknowledges a message on receipt and hands it to its own
//! dispatch task, so one slow call never holds up a partition.

use crate::dispatcher::Dispatcher;
use crate::domain::{RenterConfig, RenterError, RenterIdentity};
use crate::offers::StorageOfferOrchestrator;
use crate::ports::outbound::NetworkInterface;
use crate::renewal::ContractRenewer;
use complex_telemetry::{register_metrics, RENTER_JOBS_RECEIVED, RENTER_JOBS_REJECTED};
use cx_01_sharding::{partition_range, queue_name, queue_offset, PartitionRange};
use shared_bus::{MessageBus, WorkConsumer};
use shared_types::{
    Contact, ContactStore, MirrorStore, StorageManager, WorkRequest, WorkResult,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Lifecycle of a renter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenterState {
    Idle,
    Starting,
    Running,
    FailedToStart(String),
    Stopped,
}

impl RenterState {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::FailedToStart(_) => "failed",
            Self::Stopped => "stopped",
        }
    }
}

/// Collaborators the renter is wired to.
#[derive(Clone)]
pub struct RenterPorts {
    pub bus: Arc<dyn MessageBus>,
    /// Must present a contact whose node id is this renter's identity.
    pub network: Arc<dyn NetworkInterface>,
    pub contacts: Arc<dyn ContactStore>,
    pub storage: Arc<dyn StorageManager>,
    pub mirrors: Arc<dyn MirrorStore>,
}

pub struct RenterService {
    config: RenterConfig,
    identity: Arc<RenterIdentity>,
    ports: RenterPorts,
    dispatcher: Dispatcher,
    state: RenterState,
    tasks: Option<JoinSet<()>>,
}

impl RenterService {
    /// Validate `config` and derive the operating identity.
    pub fn new(config: RenterConfig, ports: RenterPorts) -> Result<Self, RenterError> {
        config.validate()?;
        let identity = Arc::new(RenterIdentity::from_config(&config)?);

        let renewer = ContractRenewer::new(
            Arc::clone(&identity),
            Arc::clone(&ports.network),
            Arc::clone(&ports.storage),
        );
        let offers = StorageOfferOrchestrator::new(
            Arc::clone(&identity),
            Arc::clone(&ports.network),
            Arc::clone(&ports.storage),
            Arc::clone(&ports.mirrors),
            config.max_offers,
        );
        let dispatcher = Dispatcher::new(Arc::clone(&ports.network), renewer, offers);

        Ok(Self {
            config,
            identity,
            ports,
            dispatcher,
            state: RenterState::Idle,
            tasks: None,
        })
    }

    pub fn identity(&self) -> &RenterIdentity {
        &self.identity
    }

    pub fn state(&self) -> &RenterState {
        &self.state
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Subscribe to this renter's partitions and join the network.
    ///
    /// Returns the subscribed partition range.
    pub async fn start(&mut self) -> Result<PartitionRange, RenterError> {
        match self.state {
            RenterState::Idle | RenterState::FailedToStart(_) => {}
            ref other => return Err(RenterError::InvalidState(other.name())),
        }

        if let Err(e) = register_metrics() {
            warn!(error = %e, "Metrics registration failed");
        }

        self.state = RenterState::Starting;
        match self.try_start().await {
            Ok((range, tasks)) => {
                self.tasks = Some(tasks);
                self.state = RenterState::Running;
                info!(
                    node_id = %self.identity.node_id(),
                    start = range.start,
                    end = range.end,
                    "Renter ready"
                );
                Ok(range)
            }
            Err(e) => {
                error!(error = %e, "Renter failed to start");
                self.state = RenterState::FailedToStart(e.to_string());
                Err(e)
            }
        }
    }

    async fn try_start(&self) -> Result<(PartitionRange, JoinSet<()>), RenterError> {
        let offset = queue_offset(&self.config.span_params())?;
        let center = self.ports.network.contact().node_id.first_byte();
        let range = partition_range(center, offset)?;

        let seeds = self.load_known_seeds().await?;

        // Dropping the set on an early return aborts every task in it.
        let mut tasks = JoinSet::new();
        let topic: Arc<str> = Arc::from(self.config.result_topic.as_str());
        for partition in range.partitions() {
            let consumer = self.ports.bus.consume(&queue_name(partition)).await?;
            tasks.spawn(consume_work(
                consumer,
                self.dispatcher.clone(),
                Arc::clone(&self.ports.bus),
                Arc::clone(&topic),
            ));
        }
        debug!(
            queues = range.len(),
            offset, center, "Attached to work queues"
        );

        let added = self.ports.network.subscribe_contacts();
        self.ports.network.join(seeds).await?;
        tasks.spawn(record_contacts(added, Arc::clone(&self.ports.contacts)));

        Ok((range, tasks))
    }

    /// URLs of the most recently seen contacts.
    async fn load_known_seeds(&self) -> Result<Vec<String>, RenterError> {
        let contacts = self
            .ports
            .contacts
            .find_recent(self.config.known_seed_limit)
            .await?;
        debug!(count = contacts.len(), "Loaded known seeds");
        Ok(contacts.iter().map(Contact::url).collect())
    }

    /// Stop consuming and recording contacts. Jobs already dispatched run
    /// to completion.
    pub async fn shutdown(&mut self) {
        if let Some(mut tasks) = self.tasks.take() {
            info!("Shutting down renter");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
        self.state = RenterState::Stopped;
    }
}

async fn consume_work(
    mut consumer: WorkConsumer,
    dispatcher: Dispatcher,
    bus: Arc<dyn MessageBus>,
    topic: Arc<str>,
) {
    while let Some(delivery) = consumer.next().await {
        let payload = delivery.ack();
        RENTER_JOBS_RECEIVED.inc();

        let request = match WorkRequest::from_slice(&payload) {
            Ok(request) => request,
            Err(e) => {
                RENTER_JOBS_REJECTED.inc();
                warn!(queue = consumer.queue(), error = %e, "Dropping malformed work message");
                continue;
            }
        };
        info!(id = %request.id, method = %request.method, queue = consumer.queue(), "Received job");

        let dispatcher = dispatcher.clone();
        let bus = Arc::clone(&bus);
        let topic = Arc::clone(&topic);
        tokio::spawn(async move {
            if let Some(result) = dispatcher.handle(request).await {
                publish_result(bus.as_ref(), &topic, result).await;
            }
        });
    }
    debug!(queue = consumer.queue(), "Work queue closed");
}

async fn publish_result(bus: &dyn MessageBus, topic: &str, result: WorkResult) {
    match bus.publish(topic, result.to_bytes()).await {
        Ok(0) => debug!(id = %result.id, topic, "No landlord subscribed to results"),
        Ok(_) => debug!(id = %result.id, "Published result"),
        Err(e) => error!(id = %result.id, topic, error = %e, "Unable to publish result"),
    }
}

async fn record_contacts(mut added: broadcast::Receiver<Contact>, contacts: Arc<dyn ContactStore>) {
    loop {
        match added.recv().await {
            Ok(contact) => {
                if let Err(e) = contacts.record(&contact).await {
                    warn!(node_id = %contact.node_id, error = %e, "Unable to record contact");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Contact recorder lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
