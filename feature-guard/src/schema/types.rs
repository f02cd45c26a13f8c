//! Schema model: feature specifications and the named domains they reference.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use tracing::{debug, instrument};

use crate::error::{FeatureGuardError, Result};
use crate::types::FeatureType;

/// Allowed values of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainKind {
    /// Closed set of categorical values.
    Enumerated { values: BTreeSet<String> },
    /// Inclusive numeric range.
    Range { min: f64, max: f64 },
}

impl DomainKind {
    /// Builds an enumerated domain.
    pub fn enumerated<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DomainKind::Enumerated {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a numeric range domain.
    pub fn range(min: f64, max: f64) -> Self {
        DomainKind::Range { min, max }
    }

    /// Returns true if `value` is allowed. Range domains allow no strings.
    pub fn allows_str(&self, value: &str) -> bool {
        match self {
            DomainKind::Enumerated { values } => values.contains(value),
            DomainKind::Range { .. } => false,
        }
    }

    /// Returns true if `value` lies in the range. Enumerated domains allow no numbers.
    pub fn allows_number(&self, value: f64) -> bool {
        match self {
            DomainKind::Range { min, max } => *min <= value && value <= *max,
            DomainKind::Enumerated { .. } => false,
        }
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainKind::Enumerated { values } => write!(f, "enumerated({} values)", values.len()),
            DomainKind::Range { min, max } => write!(f, "range[{min}, {max}]"),
        }
    }
}

/// A named, reusable domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub kind: DomainKind,
}

impl Domain {
    pub fn new(name: impl Into<String>, kind: DomainKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Bounds on the number of values per present example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCountBounds {
    pub min: u64,
    pub max: u64,
}

impl ValueCountBounds {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, count: u64) -> bool {
        self.min <= count && count <= self.max
    }
}

/// Lower bounds on how often a feature must be present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresenceBounds {
    /// Minimum fraction of examples containing the feature
    pub min_fraction: f64,
    /// Minimum number of examples containing the feature
    pub min_count: u64,
}

impl PresenceBounds {
    pub fn new(min_fraction: f64, min_count: u64) -> Self {
        Self {
            min_fraction,
            min_count,
        }
    }

    /// Bounds that any dataset satisfies.
    pub fn optional() -> Self {
        Self::new(0.0, 0)
    }
}

impl Default for PresenceBounds {
    fn default() -> Self {
        Self::optional()
    }
}

/// Expectations about a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_type: Option<FeatureType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_count: Option<ValueCountBounds>,
    #[serde(default)]
    pub presence: PresenceBounds,
    /// Name of the domain in the enclosing schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Set when the type was inferred from conflicting observations
    #[serde(default)]
    pub low_confidence: bool,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>, feature_type: FeatureType) -> Self {
        Self {
            name: name.into(),
            feature_type: Some(feature_type),
            value_count: None,
            presence: PresenceBounds::default(),
            domain: None,
            low_confidence: false,
        }
    }

    pub fn with_value_count(mut self, min: u64, max: u64) -> Self {
        self.value_count = Some(ValueCountBounds::new(min, max));
        self
    }

    pub fn with_presence(mut self, min_fraction: f64, min_count: u64) -> Self {
        self.presence = PresenceBounds::new(min_fraction, min_count);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_low_confidence(mut self, low_confidence: bool) -> Self {
        self.low_confidence = low_confidence;
        self
    }
}

/// The expected shape of a dataset.
///
/// Feature and domain names are unique and every domain reference resolves;
/// [`Schema::validate_structure`] checks this and loading a schema enforces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    features: Vec<FeatureSpec>,
    #[serde(default)]
    domains: Vec<Domain>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Returns a mutable handle to the named feature.
    pub fn feature_mut(&mut self, name: &str) -> Result<&mut FeatureSpec> {
        self.features
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| FeatureGuardError::feature_not_found(name))
    }

    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.name == name)
    }

    /// Returns a mutable handle to the named domain.
    pub fn domain_mut(&mut self, name: &str) -> Result<&mut Domain> {
        self.domains
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| FeatureGuardError::domain_not_found(name))
    }

    /// Resolves the domain referenced by a feature, if it has one.
    pub fn feature_domain(&self, feature: &str) -> Result<Option<&Domain>> {
        let spec = self
            .feature(feature)
            .ok_or_else(|| FeatureGuardError::feature_not_found(feature))?;
        match &spec.domain {
            None => Ok(None),
            Some(name) => self
                .domain(name)
                .map(Some)
                .ok_or_else(|| FeatureGuardError::schema_reference(feature, name)),
        }
    }

    /// Returns a mutable handle to the domain referenced by a feature.
    ///
    /// Changes are visible to every feature sharing that domain.
    pub fn feature_domain_mut(&mut self, feature: &str) -> Result<&mut Domain> {
        let name = self
            .feature(feature)
            .ok_or_else(|| FeatureGuardError::feature_not_found(feature))?
            .domain
            .clone()
            .ok_or_else(|| {
                FeatureGuardError::domain_not_found(format!("<none referenced by '{feature}'>"))
            })?;
        self.domains
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| FeatureGuardError::schema_reference(feature, name))
    }

    /// Adds a feature; its name must be new.
    pub fn add_feature(&mut self, spec: FeatureSpec) -> Result<()> {
        if self.feature(&spec.name).is_some() {
            return Err(FeatureGuardError::DuplicateFeature(spec.name));
        }
        self.features.push(spec);
        Ok(())
    }

    /// Adds a domain; its name must be new.
    pub fn add_domain(&mut self, domain: Domain) -> Result<()> {
        if self.domain(&domain.name).is_some() {
            return Err(FeatureGuardError::DuplicateDomain(domain.name));
        }
        self.domains.push(domain);
        Ok(())
    }

    /// Gives a feature its own domain, named after the feature.
    ///
    /// An existing domain of that name is replaced when no other feature
    /// references it. Replacing a domain shared with other features is
    /// refused; edit it through [`Schema::domain_mut`] instead.
    pub fn set_domain(&mut self, feature: &str, kind: DomainKind) -> Result<()> {
        if self.feature(feature).is_none() {
            return Err(FeatureGuardError::feature_not_found(feature));
        }

        let shared_with: Vec<&str> = self
            .features
            .iter()
            .filter(|f| f.name != feature && f.domain.as_deref() == Some(feature))
            .map(|f| f.name.as_str())
            .collect();
        if !shared_with.is_empty() {
            return Err(FeatureGuardError::configuration(format!(
                "domain '{feature}' is shared with {}",
                shared_with.join(", ")
            )));
        }

        match self.domains.iter_mut().find(|d| d.name == feature) {
            Some(existing) => existing.kind = kind,
            None => self.domains.push(Domain::new(feature, kind)),
        }
        self.feature_mut(feature)?.domain = Some(feature.to_string());
        debug!(feature, "Domain set");
        Ok(())
    }

    /// Drops domains no feature references and returns how many were removed.
    pub fn remove_unused_domains(&mut self) -> usize {
        let used: HashSet<&str> = self
            .features
            .iter()
            .filter_map(|f| f.domain.as_deref())
            .collect();
        let before = self.domains.len();
        let kept: Vec<Domain> = self
            .domains
            .iter()
            .filter(|d| used.contains(d.name.as_str()))
            .cloned()
            .collect();
        self.domains = kept;
        before - self.domains.len()
    }

    /// Checks name uniqueness and that every domain reference resolves.
    pub fn validate_structure(&self) -> Result<()> {
        let mut feature_names = HashSet::new();
        for spec in &self.features {
            if !feature_names.insert(spec.name.as_str()) {
                return Err(FeatureGuardError::DuplicateFeature(spec.name.clone()));
            }
        }

        let mut domain_names = HashSet::new();
        for domain in &self.domains {
            if !domain_names.insert(domain.name.as_str()) {
                return Err(FeatureGuardError::DuplicateDomain(domain.name.clone()));
            }
        }

        for spec in &self.features {
            if let Some(domain) = &spec.domain {
                if !domain_names.contains(domain.as_str()) {
                    return Err(FeatureGuardError::schema_reference(&spec.name, domain));
                }
            }
        }
        Ok(())
    }

    /// Parses a schema from JSON and checks its structure.
    pub fn from_json(json: &str) -> Result<Schema> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.validate_structure()?;
        Ok(schema)
    }

    /// Serializes to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a schema previously written with [`Schema::write`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Schema> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Writes the schema as indented JSON.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json_pretty()?)?;
        Ok(())
    }

    pub(crate) fn from_parts(features: Vec<FeatureSpec>, domains: Vec<Domain>) -> Self {
        Self { features, domains }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .add_feature(
                FeatureSpec::new("payment_type", FeatureType::Categorical)
                    .with_presence(1.0, 1)
                    .with_domain("payment_type"),
            )
            .unwrap();
        schema
            .add_domain(Domain::new(
                "payment_type",
                DomainKind::enumerated(["Cash", "Credit Card"]),
            ))
            .unwrap();
        schema
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut schema = payment_schema();
        assert!(matches!(
            schema.add_feature(FeatureSpec::new("payment_type", FeatureType::Numeric)),
            Err(FeatureGuardError::DuplicateFeature(_))
        ));
        assert!(matches!(
            schema.add_domain(Domain::new("payment_type", DomainKind::range(0.0, 1.0))),
            Err(FeatureGuardError::DuplicateDomain(_))
        ));
    }

    #[test]
    fn test_feature_domain_mut_edits_shared_domain() {
        let mut schema = payment_schema();
        match &mut schema.feature_domain_mut("payment_type").unwrap().kind {
            DomainKind::Enumerated { values } => {
                values.insert("Prcard".to_string());
            }
            other => panic!("unexpected domain {other:?}"),
        }
        let domain = schema.feature_domain("payment_type").unwrap().unwrap();
        assert!(domain.kind.allows_str("Prcard"));
    }

    #[test]
    fn test_lookup_errors() {
        let mut schema = payment_schema();
        assert!(matches!(
            schema.feature_mut("missing"),
            Err(FeatureGuardError::FeatureNotFound { .. })
        ));
        assert!(matches!(
            schema.domain_mut("missing"),
            Err(FeatureGuardError::DomainNotFound { .. })
        ));
    }

    #[test]
    fn test_dangling_reference_is_structural_error() {
        let mut schema = payment_schema();
        schema.feature_mut("payment_type").unwrap().domain = Some("nowhere".to_string());

        let err = schema.validate_structure().unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().starts_with("SchemaReferenceError"));
        assert!(schema.feature_domain("payment_type").is_err());
    }

    #[test]
    fn test_set_domain_replaces_and_repoints() {
        let mut schema = payment_schema();
        schema
            .add_feature(FeatureSpec::new("fare", FeatureType::Numeric))
            .unwrap();
        schema.set_domain("fare", DomainKind::range(0.0, 500.0)).unwrap();
        schema.set_domain("fare", DomainKind::range(0.0, 900.0)).unwrap();

        assert_eq!(schema.feature("fare").unwrap().domain.as_deref(), Some("fare"));
        assert_eq!(schema.domains().len(), 2);
        assert_eq!(
            schema.domain("fare").unwrap().kind,
            DomainKind::range(0.0, 900.0)
        );
        schema.validate_structure().unwrap();
    }

    #[test]
    fn test_set_domain_refuses_shared_domain() {
        let mut schema = payment_schema();
        schema
            .add_feature(
                FeatureSpec::new("refund_type", FeatureType::Categorical)
                    .with_domain("payment_type"),
            )
            .unwrap();
        assert!(schema
            .set_domain("payment_type", DomainKind::enumerated(["Cash"]))
            .is_err());
    }

    #[test]
    fn test_remove_unused_domains() {
        let mut schema = payment_schema();
        schema
            .add_domain(Domain::new("orphan", DomainKind::range(1.0, 2.0)))
            .unwrap();
        assert_eq!(schema.remove_unused_domains(), 1);
        assert!(schema.domain("orphan").is_none());
        assert!(schema.domain("payment_type").is_some());
    }

    #[test]
    fn test_json_round_trip_checks_structure() {
        let schema = payment_schema();
        let json = schema.to_json_pretty().unwrap();
        assert_eq!(Schema::from_json(&json).unwrap(), schema);

        let broken = json.replace("\"domain\": \"payment_type\"", "\"domain\": \"gone\"");
        assert!(matches!(
            Schema::from_json(&broken),
            Err(FeatureGuardError::SchemaReference { .. })
        ));
    }

    #[test]
    fn test_domain_kind_membership() {
        let range = DomainKind::range(1.0, 5.0);
        assert!(range.allows_number(1.0) && range.allows_number(5.0));
        assert!(!range.allows_number(5.5));
        assert!(!range.allows_str("1"));
        assert_eq!(range.to_string(), "range[1, 5]");
    }
}
