//! Graphite knowledge base client.
//!
//! The dictionary is curated in a Graphite concept scheme reachable through
//! a SPARQL HTTP endpoint. Queries are posted as form-encoded `query=`
//! bodies with basic auth, and results come back as
//! `application/sparql-results+json`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use cdd_common::ClinicalAttributeMetadata;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bindings::{RowBinding, SparqlResponse};
use crate::source::{ClinicalAttributeSource, SourceError};

fn default_timeout_secs() -> u64 {
    30
}

/// Configuration for a Graphite SPARQL endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphiteConfig {
    /// SPARQL endpoint URL.
    pub url: String,

    /// Basic auth username.
    #[serde(default)]
    pub username: String,

    /// Basic auth password.
    #[serde(default)]
    pub password: String,

    /// Namespace bound to the `cdd:` prefix in every query.
    #[serde(default)]
    pub cdd_namespace_prefix: String,

    /// Concept scheme (graph) id holding the dictionary.
    #[serde(default)]
    pub cdd_graph_id: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GraphiteConfig {
    /// Creates a new configuration for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: String::new(),
            password: String::new(),
            cdd_namespace_prefix: String::new(),
            cdd_graph_id: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Sets the basic auth username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the basic auth password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Sets the namespace bound to the `cdd:` prefix.
    #[must_use]
    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cdd_namespace_prefix = prefix.into();
        self
    }

    /// Sets the concept scheme (graph) id.
    #[must_use]
    pub fn with_graph_id(mut self, graph_id: impl Into<String>) -> Self {
        self.cdd_graph_id = graph_id.into();
        self
    }

    /// Sets the request timeout in seconds.
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// [`ClinicalAttributeSource`] implementation backed by Graphite.
pub struct GraphiteSource {
    config: GraphiteConfig,
    client: reqwest::Client,
}

impl GraphiteSource {
    /// Creates a new source from the given configuration.
    pub fn new(config: GraphiteConfig) -> Result<Self, SourceError> {
        if config.url.is_empty() {
            return Err(SourceError::Configuration(
                "graphite url must not be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Configuration(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// SPARQL for every published attribute definition in the dictionary
    /// scheme.
    fn attributes_query(&self) -> String {
        format!(
            "PREFIX cdd: <{prefix}> \
             PREFIX skos: <http://www.w3.org/2004/02/skos/core#> \
             PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#> \
             PREFIX g: <http://schema.synaptica.com/oasis#> \
             SELECT ?column_header ?display_name ?attribute_type ?datatype ?description ?priority \
             WHERE {{ \
             ?subject skos:inScheme <{graph}> . \
             ?subject rdfs:label ?column_header . \
             ?subject cdd:attributetype ?attribute_type . \
             ?subject cdd:datatype ?datatype . \
             ?subject cdd:description ?description . \
             ?subject cdd:displayname ?display_name . \
             ?subject cdd:priority ?priority . \
             OPTIONAL {{ ?subject g:conceptStatus ?concept_status . }} \
             FILTER (?concept_status = 'Published') \
             }}",
            prefix = self.config.cdd_namespace_prefix,
            graph = self.config.cdd_graph_id,
        )
    }

    /// SPARQL for every published override value, one row per (study, column
    /// header) pair. Override values hang off per-study concepts two levels
    /// below the attribute; `SAMPLE` collapses the grouped rows so each
    /// field appears at most once per pair.
    fn overrides_query(&self) -> String {
        format!(
            "PREFIX cdd: <{prefix}> \
             PREFIX skos: <http://www.w3.org/2004/02/skos/core#> \
             PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#> \
             PREFIX g: <http://schema.synaptica.com/oasis#> \
             SELECT DISTINCT ?study_id ?column_header \
             (SAMPLE(?PriorityValue) AS ?priority) \
             (SAMPLE(?AttributeTypeValue) AS ?attribute_type) \
             (SAMPLE(?DatatypeValue) AS ?datatype) \
             (SAMPLE(?DescriptionValue) AS ?description) \
             (SAMPLE(?DisplayNameValue) AS ?display_name) \
             WHERE {{ \
             ?node skos:inScheme <{graph}> . \
             ?node cdd:type ?type . \
             ?node skos:broader ?parent . \
             ?parent cdd:studyid ?study_id . \
             ?parent skos:broader ?grandparent . \
             ?grandparent rdfs:label ?column_header . \
             OPTIONAL {{ ?node cdd:priorityvalue ?PriorityValue }} . \
             OPTIONAL {{ ?node cdd:attributetypevalue ?AttributeTypeValue }} . \
             OPTIONAL {{ ?node cdd:datatypevalue ?DatatypeValue }} . \
             OPTIONAL {{ ?node cdd:descriptionvalue ?DescriptionValue }} . \
             OPTIONAL {{ ?node cdd:displaynamevalue ?DisplayNameValue }} . \
             OPTIONAL {{ ?node g:conceptStatus ?concept_status_node . }} \
             OPTIONAL {{ ?parent g:conceptStatus ?concept_status_parent . }} \
             OPTIONAL {{ ?grandparent g:conceptStatus ?concept_status_grandparent . }} \
             FILTER (STR(?type) IN ('ClinicalAttributeOverridePriorityValue', \
             'ClinicalAttributeOverrideAttributeTypeValue', \
             'ClinicalAttributeOverrideDatatypeValue', \
             'ClinicalAttributeOverrideDescriptionValue', \
             'ClinicalAttributeOverrideDisplayNameValue')) \
             FILTER (?concept_status_node = 'Published') \
             FILTER (?concept_status_parent = 'Published') \
             FILTER (?concept_status_grandparent = 'Published') \
             }} \
             GROUP BY ?study_id ?column_header \
             ORDER BY ?study_id ?column_header",
            prefix = self.config.cdd_namespace_prefix,
            graph = self.config.cdd_graph_id,
        )
    }

    fn authorization_header(&self) -> String {
        let credentials = format!("{}:{}", self.config.username, self.config.password);
        format!("Basic {}", BASE64_STANDARD.encode(credentials))
    }

    /// Posts a SPARQL query and decodes the result set. A failed attempt is
    /// retried exactly once before the error is surfaced.
    async fn query(&self, query: &str) -> Result<SparqlResponse, SourceError> {
        match self.execute(query).await {
            Ok(response) => Ok(response),
            Err(e) => {
                debug!(error = %e, "sparql query failed, making second attempt");
                self.execute(query).await
            }
        }
    }

    async fn execute(&self, query: &str) -> Result<SparqlResponse, SourceError> {
        let response = self
            .client
            .post(&self.config.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::AUTHORIZATION, self.authorization_header())
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout
                } else {
                    SourceError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "graphite returned HTTP {status}"
            )));
        }

        response.json::<SparqlResponse>().await.map_err(|e| {
            if e.is_decode() {
                SourceError::Malformed(e.to_string())
            } else if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Unavailable(e.to_string())
            }
        })
    }
}

#[async_trait]
impl ClinicalAttributeSource for GraphiteSource {
    async fn fetch_attributes(&self) -> Result<Vec<ClinicalAttributeMetadata>, SourceError> {
        info!("fetching clinical attribute metadata from graphite");
        let response = self.query(&self.attributes_query()).await?;
        let total = response.results.bindings.len();
        let attributes: Vec<ClinicalAttributeMetadata> = response
            .results
            .bindings
            .into_iter()
            .filter_map(RowBinding::into_attribute)
            .collect();
        if attributes.len() < total {
            warn!(
                dropped = total - attributes.len(),
                "dropped attribute rows without a column header"
            );
        }
        debug!(count = attributes.len(), "fetched clinical attributes");
        Ok(attributes)
    }

    async fn fetch_overrides(
        &self,
    ) -> Result<HashMap<String, Vec<ClinicalAttributeMetadata>>, SourceError> {
        info!("fetching clinical attribute metadata overrides from graphite");
        let response = self.query(&self.overrides_query()).await?;
        let total = response.results.bindings.len();
        let mut kept = 0usize;
        let mut overrides: HashMap<String, Vec<ClinicalAttributeMetadata>> = HashMap::new();
        for (study_id, record) in response
            .results
            .bindings
            .into_iter()
            .filter_map(RowBinding::into_override)
        {
            overrides.entry(study_id).or_default().push(record);
            kept += 1;
        }
        if kept < total {
            warn!(
                dropped = total - kept,
                "dropped override rows without a study id or column header"
            );
        }
        debug!(
            studies = overrides.len(),
            records = kept,
            "fetched clinical attribute overrides"
        );
        Ok(overrides)
    }

    fn name(&self) -> &str {
        "graphite"
    }
}
