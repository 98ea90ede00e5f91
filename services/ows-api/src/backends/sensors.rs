//! SOS: sensor descriptions and observation offerings.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use ows_common::{OwsError, OwsResult};
use ows_protocol::request::{DescribeSensor, GetObservation};
use ows_protocol::response::{Observation, ObservationCollection, OfferingInfo};
use ows_protocol::{CanonicalRequest, CanonicalResponse, Document, Handler, RequestPayload};
use tracing::{debug, info};

use super::unexpected;
use crate::config::{OfferingConfig, SensorsConfig};

/// Response format offered when an offering lists none.
pub const OM_FORMAT: &str = "text/xml;subtype=\"om/1.0.0\"";

struct Offering {
    info: OfferingInfo,
    observations: Vec<(DateTime<Utc>, Observation)>,
}

pub struct SensorRegistry {
    offerings: Vec<Offering>,
    /// procedure -> (format, document)
    descriptions: HashMap<String, Vec<(String, String)>>,
}

impl SensorRegistry {
    /// Load offerings and sensor descriptions. Description files are read
    /// once here.
    pub fn from_config(config: &SensorsConfig) -> Result<Self> {
        let offerings = config
            .offerings
            .iter()
            .map(Offering::from_config)
            .collect::<Result<Vec<_>>>()?;

        let mut descriptions: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for description in &config.descriptions {
            let document = match (&description.document, &description.file) {
                (Some(document), _) => document.clone(),
                (None, Some(path)) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read sensor description {}", path.display()))?,
                (None, None) => bail!(
                    "Sensor description for {} has neither a document nor a file",
                    description.procedure
                ),
            };
            descriptions
                .entry(description.procedure.clone())
                .or_default()
                .push((description.format.clone(), document));
        }

        info!(
            offerings = offerings.len(),
            sensors = descriptions.len(),
            "Loaded sensor registry"
        );
        Ok(Self {
            offerings,
            descriptions,
        })
    }

    pub fn offering_infos(&self) -> Vec<OfferingInfo> {
        self.offerings.iter().map(|o| o.info.clone()).collect()
    }

    pub fn describe(&self, request: &DescribeSensor) -> OwsResult<Document> {
        let formats = self.descriptions.get(&request.procedure).ok_or_else(|| {
            OwsError::invalid_value("procedure", format!("Unknown procedure: {}", request.procedure))
        })?;
        let (format, document) = formats
            .iter()
            .find(|(format, _)| same_format(format, &request.output_format))
            .ok_or_else(|| {
                OwsError::invalid_value(
                    "outputFormat",
                    format!("{} is not available for {}", request.output_format, request.procedure),
                )
            })?;
        Ok(Document::new(format.clone(), document.clone().into_bytes()))
    }

    pub fn observe(&self, request: &GetObservation) -> OwsResult<ObservationCollection> {
        let offering = self
            .offerings
            .iter()
            .find(|o| o.info.identifier == request.offering)
            .ok_or_else(|| OwsError::invalid_value("offering", format!("Unknown offering: {}", request.offering)))?;

        if !offering
            .info
            .response_formats
            .iter()
            .any(|f| same_format(f, &request.response_format))
        {
            return Err(OwsError::invalid_value(
                "responseFormat",
                format!("{} is not offered by {}", request.response_format, request.offering),
            ));
        }

        for property in &request.observed_properties {
            if !offering.info.observed_properties.contains(property) {
                return Err(OwsError::invalid_value(
                    "observedProperty",
                    format!("{} is not observed by {}", property, request.offering),
                ));
            }
        }

        let window = request.event_time.as_deref().map(TimeWindow::parse).transpose()?;
        let observations: Vec<Observation> = offering
            .observations
            .iter()
            .filter(|(_, o)| request.observed_properties.contains(&o.observed_property))
            .filter(|(_, o)| request.procedures.is_empty() || request.procedures.contains(&o.procedure))
            .filter(|(_, o)| {
                request.features_of_interest.is_empty() || request.features_of_interest.contains(&o.feature_of_interest)
            })
            .filter(|(time, _)| window.as_ref().map_or(true, |w| w.contains(time)))
            .map(|(_, o)| o.clone())
            .collect();

        debug!(offering = %request.offering, count = observations.len(), "Observations selected");
        Ok(ObservationCollection {
            offering: request.offering.clone(),
            observations,
        })
    }
}

impl Offering {
    fn from_config(config: &OfferingConfig) -> Result<Self> {
        let mut observations = config
            .observations
            .iter()
            .map(|o| {
                let time = parse_time(&o.time)
                    .with_context(|| format!("Bad observation time in offering {}", config.identifier))?;
                Ok((
                    time,
                    Observation {
                        procedure: o.procedure.clone(),
                        observed_property: o.observed_property.clone(),
                        feature_of_interest: o.feature_of_interest.clone(),
                        sampling_time: o.time.clone(),
                        value: o.value,
                        uom: o.uom.clone(),
                    },
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        observations.sort_by_key(|(time, _)| *time);

        let response_formats = if config.response_formats.is_empty() {
            vec![OM_FORMAT.to_string()]
        } else {
            config.response_formats.clone()
        };
        let name = if config.name.is_empty() {
            config.identifier.clone()
        } else {
            config.name.clone()
        };

        Ok(Self {
            info: OfferingInfo {
                identifier: config.identifier.clone(),
                name,
                procedures: config.procedures.clone(),
                observed_properties: config.observed_properties.clone(),
                features_of_interest: config.features_of_interest.clone(),
                time_begin: observations.first().map(|(_, o)| o.sampling_time.clone()),
                time_end: observations.last().map(|(_, o)| o.sampling_time.clone()),
                response_formats,
                bbox: config.bbox.clone(),
            },
            observations,
        })
    }
}

/// MIME types compare case-insensitively, ignoring whitespace and quotes
/// around parameter values.
fn same_format(a: &str, b: &str) -> bool {
    let normalize = |s: &str| {
        s.chars()
            .filter(|c| !c.is_whitespace() && *c != '"')
            .collect::<String>()
            .to_ascii_lowercase()
    };
    normalize(a) == normalize(b)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|t| t.with_timezone(&Utc))
}

/// An instant or a closed `begin/end` period.
#[derive(Debug, PartialEq)]
struct TimeWindow {
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    fn parse(value: &str) -> OwsResult<Self> {
        let bad = |e: chrono::ParseError| OwsError::invalid_value("eventTime", format!("{}: {}", value, e));
        match value.split_once('/') {
            Some((begin, end)) => {
                let window = Self {
                    begin: parse_time(begin.trim()).map_err(bad)?,
                    end: parse_time(end.trim()).map_err(bad)?,
                };
                if window.begin > window.end {
                    return Err(OwsError::invalid_value("eventTime", format!("{} ends before it begins", value)));
                }
                Ok(window)
            }
            None => {
                let instant = parse_time(value.trim()).map_err(bad)?;
                Ok(Self {
                    begin: instant,
                    end: instant,
                })
            }
        }
    }

    fn contains(&self, time: &DateTime<Utc>) -> bool {
        self.begin <= *time && *time <= self.end
    }
}

pub fn describe_sensor(sensors: Arc<SensorRegistry>) -> Arc<dyn Handler> {
    Arc::new(move |request: CanonicalRequest| -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::DescribeSensor(describe) => Ok(CanonicalResponse::Document(sensors.describe(describe)?)),
            _ => Err(unexpected(&request)),
        }
    })
}

pub fn get_observation(sensors: Arc<SensorRegistry>) -> Arc<dyn Handler> {
    Arc::new(move |request: CanonicalRequest| -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::GetObservation(get) => Ok(CanonicalResponse::Observations(sensors.observe(get)?)),
            _ => Err(unexpected(&request)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ObservationConfig, SensorDescriptionConfig};
    use std::io::Write;

    const PROCEDURE: &str = "urn:ogc:object:Sensor:station-1";

    fn observation(property: &str, time: &str, value: f64) -> ObservationConfig {
        ObservationConfig {
            procedure: PROCEDURE.into(),
            observed_property: property.into(),
            feature_of_interest: "station-1".into(),
            time: time.into(),
            value,
            uom: "Cel".into(),
        }
    }

    fn config() -> SensorsConfig {
        SensorsConfig {
            offerings: vec![OfferingConfig {
                identifier: "WEATHER".into(),
                name: String::new(),
                procedures: vec![PROCEDURE.into()],
                observed_properties: vec!["temperature".into(), "pressure".into()],
                features_of_interest: vec!["station-1".into()],
                response_formats: Vec::new(),
                bbox: None,
                observations: vec![
                    observation("temperature", "2024-05-01T12:00:00Z", 14.5),
                    observation("temperature", "2024-05-01T00:00:00Z", 11.0),
                    observation("pressure", "2024-05-01T00:00:00Z", 1013.0),
                    observation("temperature", "2024-05-03T00:00:00Z", 9.0),
                ],
            }],
            descriptions: vec![SensorDescriptionConfig {
                procedure: PROCEDURE.into(),
                format: "text/xml;subtype=\"sensorML/1.0.1\"".into(),
                document: Some("<sml:SensorML/>".into()),
                file: None,
            }],
        }
    }

    fn get(properties: &[&str], event_time: Option<&str>) -> GetObservation {
        GetObservation {
            offering: "WEATHER".into(),
            observed_properties: properties.iter().map(|s| s.to_string()).collect(),
            procedures: Vec::new(),
            event_time: event_time.map(str::to_string),
            features_of_interest: Vec::new(),
            response_format: OM_FORMAT.into(),
            result_model: None,
            response_mode: None,
            srs_name: None,
        }
    }

    #[test]
    fn test_offering_time_range() {
        let registry = SensorRegistry::from_config(&config()).unwrap();
        let info = &registry.offering_infos()[0];
        assert_eq!(info.name, "WEATHER");
        assert_eq!(info.time_begin.as_deref(), Some("2024-05-01T00:00:00Z"));
        assert_eq!(info.time_end.as_deref(), Some("2024-05-03T00:00:00Z"));
        assert_eq!(info.response_formats, vec![OM_FORMAT]);
    }

    #[test]
    fn test_observations_filtered_by_property_and_period() {
        let registry = SensorRegistry::from_config(&config()).unwrap();

        let all = registry.observe(&get(&["temperature"], None)).unwrap();
        assert_eq!(all.observations.len(), 3);
        assert_eq!(all.observations[0].value, 11.0);

        let period = registry
            .observe(&get(&["temperature"], Some("2024-05-01T00:00:00Z/2024-05-02T00:00:00Z")))
            .unwrap();
        let values: Vec<f64> = period.observations.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![11.0, 14.5]);

        let instant = registry
            .observe(&get(&["temperature", "pressure"], Some("2024-05-01T00:00:00Z")))
            .unwrap();
        assert_eq!(instant.observations.len(), 2);
    }

    #[test]
    fn test_observation_errors_name_their_parameter() {
        let registry = SensorRegistry::from_config(&config()).unwrap();
        let param = |err: OwsError| match err {
            OwsError::InvalidParameterValue { param, .. } => param,
            other => panic!("unexpected {:?}", other),
        };

        let mut unknown = get(&["temperature"], None);
        unknown.offering = "NOPE".into();
        assert_eq!(param(registry.observe(&unknown).unwrap_err()), "offering");

        let mut format = get(&["temperature"], None);
        format.response_format = "application/json".into();
        assert_eq!(param(registry.observe(&format).unwrap_err()), "responseFormat");

        assert_eq!(param(registry.observe(&get(&["humidity"], None)).unwrap_err()), "observedProperty");
        assert_eq!(
            param(registry.observe(&get(&["temperature"], Some("yesterday"))).unwrap_err()),
            "eventTime"
        );
    }

    #[test]
    fn test_describe_sensor_formats() {
        let registry = SensorRegistry::from_config(&config()).unwrap();
        let document = registry
            .describe(&DescribeSensor {
                procedure: PROCEDURE.into(),
                output_format: "text/xml; subtype=sensorML/1.0.1".into(),
            })
            .unwrap();
        assert_eq!(document.body.as_ref(), b"<sml:SensorML/>");

        let err = registry
            .describe(&DescribeSensor {
                procedure: PROCEDURE.into(),
                output_format: "text/html".into(),
            })
            .unwrap_err();
        assert!(matches!(err, OwsError::InvalidParameterValue { ref param, .. } if param == "outputFormat"));

        let err = registry
            .describe(&DescribeSensor {
                procedure: "urn:unknown".into(),
                output_format: "text/html".into(),
            })
            .unwrap_err();
        assert!(matches!(err, OwsError::InvalidParameterValue { ref param, .. } if param == "procedure"));
    }

    #[test]
    fn test_description_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<sml:SensorML version=\"1.0.1\"/>").unwrap();

        let mut config = config();
        config.descriptions[0].document = None;
        config.descriptions[0].file = Some(file.path().to_path_buf());
        let registry = SensorRegistry::from_config(&config).unwrap();
        assert_eq!(registry.descriptions[PROCEDURE][0].1, "<sml:SensorML version=\"1.0.1\"/>");

        config.descriptions[0].file = Some("/nonexistent/sensor.xml".into());
        assert!(SensorRegistry::from_config(&config).is_err());
    }
}
