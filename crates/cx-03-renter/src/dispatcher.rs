//! Work message dispatch.
//!
//! Turns one [`WorkRequest`] into at most one [`WorkResult`]. Method names
//! outside the allow-list never reach the network. Every other failure,
//! including params that do not decode, becomes a `-32603` result.

use crate::domain::calls::{RpcCall, RpcReply};
use crate::domain::error::DispatchError;
use crate::offers::StorageOfferOrchestrator;
use crate::ports::outbound::NetworkInterface;
use crate::renewal::ContractRenewer;
use complex_telemetry::{RENTER_DISPATCH, RENTER_JOBS_REJECTED};
use shared_types::{RpcError, RpcMethod, WorkRequest, WorkResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Dispatcher {
    network: Arc<dyn NetworkInterface>,
    renewer: ContractRenewer,
    offers: StorageOfferOrchestrator,
}

impl Dispatcher {
    pub fn new(
        network: Arc<dyn NetworkInterface>,
        renewer: ContractRenewer,
        offers: StorageOfferOrchestrator,
    ) -> Self {
        Self {
            network,
            renewer,
            offers,
        }
    }

    /// Serve one request.
    ///
    /// Returns `None` when there is nothing to publish, which happens only
    /// for a storage offer stream that ended without offers.
    pub async fn handle(&self, request: WorkRequest) -> Option<WorkResult> {
        let method: RpcMethod = match request.method.parse() {
            Ok(method) => method,
            Err(_) => {
                RENTER_JOBS_REJECTED.inc();
                warn!(id = %request.id, method = %request.method, "Method not allowed");
                return Some(WorkResult::failure(request.id, RpcError::method_not_found()));
            }
        };

        let outcome = match RpcCall::decode(method, &request.params) {
            Ok(call) => self.dispatch(call).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(Some(reply)) => {
                RENTER_DISPATCH
                    .with_label_values(&[method.as_str(), "ok"])
                    .inc();
                debug!(id = %request.id, %method, "Job completed");
                Some(WorkResult::success(request.id, reply.encode()))
            }
            Ok(None) => {
                RENTER_DISPATCH
                    .with_label_values(&[method.as_str(), "no_result"])
                    .inc();
                info!(id = %request.id, %method, "No offers received, nothing to publish");
                None
            }
            Err(e) => {
                RENTER_DISPATCH
                    .with_label_values(&[method.as_str(), "error"])
                    .inc();
                warn!(id = %request.id, %method, error = %e, "Job failed");
                Some(WorkResult::failure(request.id, e.to_rpc_error()))
            }
        }
    }

    /// Run a decoded call against the network or the local orchestration.
    pub async fn dispatch(&self, call: RpcCall) -> Result<Option<RpcReply>, DispatchError> {
        let reply = match call {
            RpcCall::GetConsignmentPointer {
                farmer,
                contract,
                audit,
            } => RpcReply::Pointer(
                self.network
                    .get_consignment_pointer(&farmer, &contract, &audit)
                    .await?,
            ),
            RpcCall::GetRetrievalPointer { farmer, contract } => {
                let contract = self.renewer.ensure_renewed(&farmer, contract).await?;
                RpcReply::Pointer(
                    self.network
                        .get_retrieval_pointer(&farmer, &contract)
                        .await?,
                )
            }
            RpcCall::GetMirrorNodes {
                sources,
                destinations,
            } => RpcReply::MirrorNodes(
                self.network
                    .get_mirror_nodes(&sources, &destinations)
                    .await?,
            ),
            RpcCall::GetStorageOffer {
                contract,
                blacklist,
            } => {
                return Ok(self
                    .offers
                    .get_storage_offer(contract, blacklist)
                    .await?
                    .map(|offer| RpcReply::Offer {
                        contact: offer.contact,
                        contract: offer.contract,
                    }))
            }
            RpcCall::GetStorageProof { farmer, item } => {
                RpcReply::Proof(self.network.get_storage_proof(&farmer, &item).await?)
            }
            RpcCall::Ping { contact } => {
                self.network.ping(&contact).await?;
                RpcReply::Pong
            }
        };
        Ok(Some(reply))
    }
}
