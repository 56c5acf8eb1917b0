use crate::models::Modality;
use serde_json::{json, Map, Value};

pub const IMAGES_COLLECTION: &str = "images";
pub const WINE_REVIEWS_COLLECTION: &str = "WineReviews";
pub const PDF_COLLECTION: &str = "pdf";
pub const VIDEOS_COLLECTION: &str = "videos";

const VECTORIZER: &str = "multi2vec-bind";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    TextArray,
    Int,
    Date,
    Blob,
}

impl DataType {
    fn wire_name(self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::TextArray => "text[]",
            DataType::Int => "int",
            DataType::Date => "date",
            DataType::Blob => "blob",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub data_type: DataType,
    pub skip_vectorization: bool,
}

impl PropertySpec {
    pub const fn new(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            skip_vectorization: false,
        }
    }

    pub const fn unvectorized(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            skip_vectorization: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorizerField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSchema {
    pub name: String,
    pub description: String,
    pub modality: Modality,
    pub properties: Vec<PropertySpec>,
    pub vector_fields: Vec<VectorizerField>,
    pub vectorize_collection_name: bool,
}

impl CollectionSchema {
    /// Weaviate capitalises the first letter of every class name.
    pub fn class_name(&self) -> String {
        class_name(&self.name)
    }

    /// Properties worth returning from a query; blobs are left on the server.
    pub fn returned_properties(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter(|property| property.data_type != DataType::Blob)
            .map(|property| property.name.to_string())
            .collect()
    }

    pub fn to_class_definition(&self) -> Value {
        let mut module = Map::new();
        let mut weights = Map::new();

        for (kind, key) in [
            (FieldKind::Text, "textFields"),
            (FieldKind::Image, "imageFields"),
            (FieldKind::Video, "videoFields"),
        ] {
            let fields = self
                .vector_fields
                .iter()
                .filter(|field| field.kind == kind)
                .collect::<Vec<_>>();
            if fields.is_empty() {
                continue;
            }
            module.insert(
                key.to_string(),
                json!(fields.iter().map(|field| field.name).collect::<Vec<_>>()),
            );
            weights.insert(
                key.to_string(),
                json!(fields.iter().map(|field| field.weight).collect::<Vec<_>>()),
            );
        }
        module.insert("weights".to_string(), Value::Object(weights));
        module.insert(
            "vectorizeClassName".to_string(),
            Value::Bool(self.vectorize_collection_name),
        );

        let properties = self
            .properties
            .iter()
            .map(|property| {
                json!({
                    "name": property.name,
                    "dataType": [property.data_type.wire_name()],
                    "moduleConfig": {
                        VECTORIZER: { "skip": property.skip_vectorization }
                    }
                })
            })
            .collect::<Vec<_>>();

        json!({
            "class": self.class_name(),
            "description": self.description,
            "vectorizer": VECTORIZER,
            "moduleConfig": { VECTORIZER: module },
            "properties": properties,
        })
    }
}

pub fn class_name(collection: &str) -> String {
    let mut chars = collection.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn images_schema() -> CollectionSchema {
    CollectionSchema {
        name: IMAGES_COLLECTION.to_string(),
        description: "Image collection".to_string(),
        modality: Modality::Image,
        properties: vec![
            PropertySpec::new("image", DataType::Blob),
            PropertySpec::unvectorized("filename", DataType::Text),
        ],
        vector_fields: vec![VectorizerField {
            name: "image",
            kind: FieldKind::Image,
            weight: 0.95,
        }],
        vectorize_collection_name: false,
    }
}

pub fn wine_reviews_schema() -> CollectionSchema {
    CollectionSchema {
        name: WINE_REVIEWS_COLLECTION.to_string(),
        description: "Wine reviews loaded from CSV".to_string(),
        modality: Modality::Tabular,
        properties: vec![
            PropertySpec::new("title", DataType::Text),
            PropertySpec::new("description", DataType::Text),
        ],
        vector_fields: vec![VectorizerField {
            name: "title",
            kind: FieldKind::Text,
            weight: 0.95,
        }],
        vectorize_collection_name: false,
    }
}

pub fn pdf_schema() -> CollectionSchema {
    CollectionSchema {
        name: PDF_COLLECTION.to_string(),
        description: "PDF documents".to_string(),
        modality: Modality::Pdf,
        properties: vec![
            PropertySpec::new("filename", DataType::Text),
            PropertySpec::new("abstract", DataType::Text),
            PropertySpec::new("pages", DataType::TextArray),
            PropertySpec::new("num_pages", DataType::Int),
            PropertySpec::new("date_created", DataType::Date),
            PropertySpec::new("date_modified", DataType::Date),
            PropertySpec::new("file_size", DataType::Text),
            PropertySpec::new("author", DataType::Text),
        ],
        vector_fields: vec![
            VectorizerField {
                name: "filename",
                kind: FieldKind::Text,
                weight: 0.20,
            },
            VectorizerField {
                name: "abstract",
                kind: FieldKind::Text,
                weight: 0.80,
            },
        ],
        vectorize_collection_name: true,
    }
}

pub fn videos_schema() -> CollectionSchema {
    CollectionSchema {
        name: VIDEOS_COLLECTION.to_string(),
        description: "Video collection".to_string(),
        modality: Modality::Video,
        properties: vec![
            PropertySpec::new("video", DataType::Blob),
            PropertySpec::unvectorized("filename", DataType::Text),
            PropertySpec::new("date_created", DataType::Date),
            PropertySpec::new("date_modified", DataType::Date),
            PropertySpec::new("file_size", DataType::Text),
        ],
        vector_fields: vec![
            VectorizerField {
                name: "video",
                kind: FieldKind::Video,
                weight: 0.95,
            },
            VectorizerField {
                name: "filename",
                kind: FieldKind::Text,
                weight: 0.05,
            },
        ],
        vectorize_collection_name: false,
    }
}

/// Every collection the tool knows, in the order searches visit them.
pub fn default_registry() -> Vec<CollectionSchema> {
    vec![
        images_schema(),
        wine_reviews_schema(),
        pdf_schema(),
        videos_schema(),
    ]
}
