use saltfish_proto::saltfish::{feature, Feature, Schema};

/// Assembles a schema feature by feature, preserving declaration order.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    features: Vec<Feature>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn numerical(self, name: &str) -> Self {
        self.feature(name, feature::Type::Numerical)
    }

    pub fn categorical(self, name: &str) -> Self {
        self.feature(name, feature::Type::Categorical)
    }

    pub fn text(self, name: &str) -> Self {
        self.feature(name, feature::Type::Text)
    }

    pub fn feature(mut self, name: &str, kind: feature::Type) -> Self {
        self.features.push(Feature {
            name: name.to_string(),
            feature_type: kind as i32,
        });
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            features: self.features,
        }
    }
}
