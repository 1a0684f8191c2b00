//! Typed RPC calls and replies.
//!
//! | Method | Params | Reply |
//! |--------|--------|-------|
//! | `getConsignmentPointer` | `[contact, contract, {challenges, tree}]` | `[null, pointer]` |
//! | `getRetrievalPointer` | `[contact, contract]` | `[null, pointer]` |
//! | `getMirrorNodes` | `[[pointer], [contact]]` | `[null, [contact]]` |
//! | `getStorageOffer` | `[contract, blacklist?]` | `[null, contact, contract]` |
//! | `getStorageProof` | `[contact, item]` | `[null, proof]` |
//! | `ping` | `[contact]` | `[null]` |
//!
//! The leading `null` of every reply is the absent error of the completion.

use crate::domain::error::DispatchError;
use serde_json::Value;
use shared_types::{
    AuditRecords, Contact, Contract, DataChannelPointer, RpcMethod, StorageItem,
};

/// A decoded call, one variant per allowed method.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcCall {
    GetConsignmentPointer {
        farmer: Contact,
        contract: Contract,
        audit: AuditRecords,
    },
    GetRetrievalPointer {
        farmer: Contact,
        contract: Contract,
    },
    GetMirrorNodes {
        sources: Vec<DataChannelPointer>,
        destinations: Vec<Contact>,
    },
    GetStorageOffer {
        contract: Contract,
        blacklist: Vec<String>,
    },
    GetStorageProof {
        farmer: Contact,
        item: StorageItem,
    },
    Ping {
        contact: Contact,
    },
}

/// What a call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    Pointer(DataChannelPointer),
    MirrorNodes(Vec<Contact>),
    Offer { contact: Contact, contract: Contract },
    Proof(Value),
    Pong,
}

struct Params<'a> {
    method: &'static str,
    values: &'a [Value],
}

impl<'a> Params<'a> {
    fn get(&self, index: usize) -> Result<&'a Value, DispatchError> {
        self.values.get(index).ok_or_else(|| {
            DispatchError::invalid_params(self.method, format!("missing argument {index}"))
        })
    }

    fn contact(&self, index: usize) -> Result<Contact, DispatchError> {
        Contact::from_value(self.get(index)?).map_err(|e| DispatchError::from_decode(self.method, e))
    }

    fn contract(&self, index: usize) -> Result<Contract, DispatchError> {
        Contract::from_object(self.get(index)?)
            .map_err(|e| DispatchError::invalid_params(self.method, e))
    }

    fn list<T>(
        &self,
        index: usize,
        decode: impl Fn(&Value) -> Result<T, shared_types::DecodeError>,
    ) -> Result<Vec<T>, DispatchError> {
        let items = self.get(index)?.as_array().ok_or_else(|| {
            DispatchError::invalid_params(self.method, format!("argument {index} must be an array"))
        })?;
        items
            .iter()
            .map(|item| decode(item).map_err(|e| DispatchError::from_decode(self.method, e)))
            .collect()
    }
}

impl RpcCall {
    /// Decode positional params for `method`.
    pub fn decode(method: RpcMethod, params: &[Value]) -> Result<Self, DispatchError> {
        let p = Params {
            method: method.as_str(),
            values: params,
        };

        let call = match method {
            RpcMethod::GetConsignmentPointer => Self::GetConsignmentPointer {
                farmer: p.contact(0)?,
                contract: p.contract(1)?,
                audit: AuditRecords::from_value(p.get(2)?)
                    .map_err(|e| DispatchError::from_decode(p.method, e))?,
            },
            RpcMethod::GetRetrievalPointer => Self::GetRetrievalPointer {
                farmer: p.contact(0)?,
                contract: p.contract(1)?,
            },
            RpcMethod::GetMirrorNodes => Self::GetMirrorNodes {
                sources: p.list(0, DataChannelPointer::from_value)?,
                destinations: p.list(1, Contact::from_value)?,
            },
            RpcMethod::GetStorageOffer => Self::GetStorageOffer {
                contract: p.contract(0)?,
                blacklist: blacklist(params.get(1)),
            },
            RpcMethod::GetStorageProof => Self::GetStorageProof {
                farmer: p.contact(0)?,
                item: StorageItem::from_value(p.get(1)?)
                    .map_err(|e| DispatchError::from_decode(p.method, e))?,
            },
            RpcMethod::Ping => Self::Ping {
                contact: p.contact(0)?,
            },
        };
        Ok(call)
    }

    pub fn method(&self) -> RpcMethod {
        match self {
            Self::GetConsignmentPointer { .. } => RpcMethod::GetConsignmentPointer,
            Self::GetRetrievalPointer { .. } => RpcMethod::GetRetrievalPointer,
            Self::GetMirrorNodes { .. } => RpcMethod::GetMirrorNodes,
            Self::GetStorageOffer { .. } => RpcMethod::GetStorageOffer,
            Self::GetStorageProof { .. } => RpcMethod::GetStorageProof,
            Self::Ping { .. } => RpcMethod::Ping,
        }
    }
}

/// A missing or non-array blacklist is empty; non-string entries are skipped.
fn blacklist(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl RpcReply {
    /// Completion arguments as published on the result topic.
    pub fn encode(&self) -> Value {
        let mut args = vec![Value::Null];
        match self {
            Self::Pointer(pointer) => args.push(pointer.to_value()),
            Self::MirrorNodes(contacts) => {
                args.push(Value::Array(contacts.iter().map(Contact::to_value).collect()))
            }
            Self::Offer { contact, contract } => {
                args.push(contact.to_value());
                args.push(contract.to_object());
            }
            Self::Proof(proof) => args.push(proof.clone()),
            Self::Pong => {}
        }
        Value::Array(args)
    }
}
