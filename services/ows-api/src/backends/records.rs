//! CSW: a static catalogue of metadata records.

use std::collections::HashMap;
use std::sync::Arc;

use ows_common::OwsResult;
use ows_protocol::request::GetRecordById;
use ows_protocol::response::{Record, RecordsResult};
use ows_protocol::{CanonicalRequest, CanonicalResponse, Handler, RequestPayload};
use tracing::debug;

use super::unexpected;
use crate::config::RecordConfig;

pub struct RecordCatalogue {
    records: HashMap<String, Record>,
}

impl RecordCatalogue {
    pub fn from_config(records: &[RecordConfig]) -> Self {
        let records = records
            .iter()
            .map(|r| {
                let record = Record {
                    identifier: r.identifier.clone(),
                    title: r.title.clone(),
                    record_type: r.record_type.clone(),
                    abstract_text: r.abstract_text.clone(),
                    subjects: r.subjects.clone(),
                    modified: r.modified.clone(),
                    bbox: r.bbox.clone(),
                };
                (r.identifier.clone(), record)
            })
            .collect();
        Self { records }
    }

    /// Records in request order; unknown ids are skipped.
    pub fn get_by_id(&self, request: &GetRecordById) -> RecordsResult {
        let records: Vec<Record> = request
            .ids
            .iter()
            .filter_map(|id| self.records.get(id))
            .cloned()
            .collect();
        debug!(requested = request.ids.len(), found = records.len(), "Records looked up");
        RecordsResult {
            element_set: request.element_set_name,
            records,
        }
    }
}

pub fn get_record_by_id(catalogue: Arc<RecordCatalogue>) -> Arc<dyn Handler> {
    Arc::new(move |request: CanonicalRequest| -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::GetRecordById(get) => Ok(CanonicalResponse::Records(catalogue.get_by_id(get))),
            _ => Err(unexpected(&request)),
        }
    })
}
