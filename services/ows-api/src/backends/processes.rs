//! WPS: a small set of built-in synchronous processes.

use std::sync::Arc;

use anyhow::{bail, Result};
use ows_common::{ExceptionCode, HandlerError, OwsError, OwsResult};
use ows_protocol::request::{DataInput, Execute, InputValue, ResponseForm};
use ows_protocol::response::{
    ExecuteResult, OutputValue, ParameterDescription, ProcessBrief, ProcessDescription, ProcessStatus,
};
use ows_protocol::{CanonicalRequest, CanonicalResponse, Document, Handler, RequestPayload};
use tracing::{debug, info};

use super::{timestamp_now, unexpected};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinProcess {
    /// Returns its `message` input unchanged.
    Echo,
    /// Adds up every `value` input.
    Sum,
}

impl BuiltinProcess {
    pub const ALL: [BuiltinProcess; 2] = [BuiltinProcess::Echo, BuiltinProcess::Sum];

    pub fn identifier(&self) -> &'static str {
        match self {
            BuiltinProcess::Echo => "Echo",
            BuiltinProcess::Sum => "Sum",
        }
    }

    fn brief(&self) -> ProcessBrief {
        let (title, abstract_text) = match self {
            BuiltinProcess::Echo => ("Echo", "Returns the message input unchanged"),
            BuiltinProcess::Sum => ("Sum", "Adds a list of numbers"),
        };
        ProcessBrief {
            identifier: self.identifier().to_string(),
            title: title.to_string(),
            abstract_text: Some(abstract_text.to_string()),
            process_version: "1.0.0".to_string(),
        }
    }

    fn describe(&self) -> ProcessDescription {
        let parameter = |identifier: &str, data_type: &str, min_occurs, max_occurs| ParameterDescription {
            identifier: identifier.to_string(),
            title: identifier.to_string(),
            data_type: data_type.to_string(),
            min_occurs,
            max_occurs,
        };
        let (inputs, outputs) = match self {
            BuiltinProcess::Echo => (
                vec![parameter("message", "string", 1, 1)],
                vec![parameter("message", "string", 1, 1)],
            ),
            BuiltinProcess::Sum => (
                vec![parameter("value", "double", 1, 100)],
                vec![parameter("sum", "double", 1, 1)],
            ),
        };
        ProcessDescription {
            brief: self.brief(),
            inputs,
            outputs,
            store_supported: false,
            status_supported: false,
        }
    }

    /// Run the process. Returns `(output identifier, data type, value)`.
    fn run(&self, inputs: &[DataInput]) -> OwsResult<(&'static str, &'static str, String)> {
        match self {
            BuiltinProcess::Echo => {
                let mut messages = inputs_named(inputs, "message");
                let message = messages.next().ok_or_else(|| OwsError::missing("message"))?;
                if messages.next().is_some() {
                    return Err(OwsError::invalid_value("message", "Echo takes exactly one message"));
                }
                Ok(("message", "string", literal(message)?.to_string()))
            }
            BuiltinProcess::Sum => {
                let mut sum = 0.0;
                let mut count = 0;
                for input in inputs_named(inputs, "value") {
                    let raw = literal(input)?;
                    let value: f64 = raw
                        .trim()
                        .parse()
                        .map_err(|_| OwsError::invalid_value("value", format!("'{}' is not a number", raw)))?;
                    sum += value;
                    count += 1;
                }
                if count == 0 {
                    return Err(OwsError::missing("value"));
                }
                Ok(("sum", "double", sum.to_string()))
            }
        }
    }
}

fn inputs_named<'a>(inputs: &'a [DataInput], identifier: &'a str) -> impl Iterator<Item = &'a DataInput> + 'a {
    inputs.iter().filter(move |i| i.identifier == identifier)
}

fn literal(input: &DataInput) -> OwsResult<&str> {
    match &input.value {
        InputValue::Literal { value, .. } => Ok(value),
        InputValue::Complex { xml } => Ok(xml),
        InputValue::Reference { .. } => Err(HandlerError::new(format!(
            "Input {} is passed by reference, which this service does not fetch",
            input.identifier
        ))
        .with_code(ExceptionCode::OptionNotSupported)
        .with_locator(input.identifier.clone())
        .into()),
    }
}

pub struct ProcessRegistry {
    processes: Vec<BuiltinProcess>,
}

impl ProcessRegistry {
    /// Enable the named built-in processes; an empty list enables all.
    pub fn from_config(names: &[String]) -> Result<Self> {
        let processes = if names.is_empty() {
            BuiltinProcess::ALL.to_vec()
        } else {
            let mut processes = Vec::with_capacity(names.len());
            for name in names {
                match BuiltinProcess::ALL.iter().find(|p| p.identifier() == name) {
                    Some(process) => processes.push(*process),
                    None => bail!("Unknown process {} (available: Echo, Sum)", name),
                }
            }
            processes
        };
        info!(processes = processes.len(), "Loaded process registry");
        Ok(Self { processes })
    }

    pub fn briefs(&self) -> Vec<ProcessBrief> {
        self.processes.iter().map(BuiltinProcess::brief).collect()
    }

    fn find(&self, identifier: &str) -> OwsResult<BuiltinProcess> {
        self.processes
            .iter()
            .copied()
            .find(|p| p.identifier() == identifier)
            .ok_or_else(|| OwsError::invalid_value("Identifier", format!("Unknown process: {}", identifier)))
    }

    pub fn describe(&self, identifiers: &[String]) -> OwsResult<Vec<ProcessDescription>> {
        if identifiers.iter().any(|id| id.eq_ignore_ascii_case("ALL")) {
            return Ok(self.processes.iter().map(BuiltinProcess::describe).collect());
        }
        identifiers
            .iter()
            .map(|id| self.find(id).map(|p| p.describe()))
            .collect()
    }

    pub fn execute(&self, execute: &Execute) -> OwsResult<CanonicalResponse> {
        let process = self.find(&execute.identifier)?;

        if let ResponseForm::Document { store, status, .. } = &execute.response_form {
            if *store || *status {
                let locator = if *store { "storeExecuteResponse" } else { "status" };
                return Err(HandlerError::new("Asynchronous execution is not supported")
                    .with_code(ExceptionCode::OptionNotSupported)
                    .with_locator(locator)
                    .into());
            }
        }

        let (output, data_type, value) = process.run(&execute.inputs)?;
        debug!(process = process.identifier(), output, "Process executed");

        match &execute.response_form {
            ResponseForm::Raw { output: requested } => {
                check_output(requested, output, "RawDataOutput")?;
                Ok(CanonicalResponse::Document(Document::new("text/plain", value.into_bytes())))
            }
            ResponseForm::Document { lineage, outputs, .. } => {
                for requested in outputs {
                    check_output(requested, output, "ResponseDocument")?;
                }
                let lineage = lineage.then(|| {
                    execute
                        .inputs
                        .iter()
                        .map(|i| {
                            let value = match &i.value {
                                InputValue::Literal { value, .. } => value.clone(),
                                InputValue::Complex { xml } => xml.clone(),
                                InputValue::Reference { href, .. } => href.clone(),
                            };
                            (i.identifier.clone(), value)
                        })
                        .collect()
                });
                Ok(CanonicalResponse::ExecuteResponse(ExecuteResult {
                    process: process.brief(),
                    creation_time: timestamp_now(),
                    status: ProcessStatus::Succeeded(format!("{} completed", process.identifier())),
                    outputs: vec![OutputValue {
                        identifier: output.to_string(),
                        title: output.to_string(),
                        data_type: data_type.to_string(),
                        value,
                    }],
                    lineage,
                }))
            }
        }
    }
}

fn check_output(requested: &str, available: &str, locator: &str) -> OwsResult<()> {
    if requested == available {
        Ok(())
    } else {
        Err(OwsError::invalid_value(locator, format!("Unknown output: {}", requested)))
    }
}

pub fn describe_process(processes: Arc<ProcessRegistry>) -> Arc<dyn Handler> {
    Arc::new(move |request: CanonicalRequest| -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::DescribeProcess(describe) => Ok(CanonicalResponse::ProcessDescriptions(
                processes.describe(&describe.identifiers)?,
            )),
            _ => Err(unexpected(&request)),
        }
    })
}

pub fn execute(processes: Arc<ProcessRegistry>) -> Arc<dyn Handler> {
    Arc::new(move |request: CanonicalRequest| -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::Execute(execute) => processes.execute(execute),
            _ => Err(unexpected(&request)),
        }
    })
}
