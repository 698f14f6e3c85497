//! Library values: tagged parts and nested assemblies.

use molecad_core::GeometryError;
use serde::{Deserialize, Serialize};

use crate::kernel::{BoundingBox, Shape};

/// Display color for freshly created geometry
pub const DEFAULT_COLOR: &str = "#aad7f2";

/// One bill-of-materials line attached to geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomEntry {
    #[serde(rename = "BOMitemName")]
    pub item: String,
    #[serde(rename = "numberNeeded", default = "default_quantity")]
    pub number_needed: f64,
    #[serde(rename = "costUSD", default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub source: String,
}

fn default_quantity() -> f64 {
    1.0
}

impl BomEntry {
    pub fn new(item: impl Into<String>, number_needed: f64, cost_usd: f64, source: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            number_needed,
            cost_usd,
            source: source.into(),
        }
    }
}

/// A single shape with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub shape: Shape,
    pub tags: Vec<String>,
    pub color: String,
    pub bom: Vec<BomEntry>,
}

impl Part {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            tags: Vec::new(),
            color: DEFAULT_COLOR.to_string(),
            bom: Vec::new(),
        }
    }

    /// Same metadata, different shape
    pub fn with_shape(&self, shape: Shape) -> Self {
        Self {
            shape,
            tags: self.tags.clone(),
            color: self.color.clone(),
            bom: self.bom.clone(),
        }
    }
}

/// A value stored in the geometry library
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryNode {
    Part(Part),
    Assembly {
        children: Vec<GeometryNode>,
        tags: Vec<String>,
        bom: Vec<BomEntry>,
    },
}

impl From<Shape> for GeometryNode {
    fn from(shape: Shape) -> Self {
        GeometryNode::Part(Part::new(shape))
    }
}

impl GeometryNode {
    pub fn tags(&self) -> &[String] {
        match self {
            GeometryNode::Part(part) => &part.tags,
            GeometryNode::Assembly { tags, .. } => tags,
        }
    }

    /// BOM lines carried by this node. Assemblies hold the lines of all
    /// their members, so this is the complete list.
    pub fn bom(&self) -> &[BomEntry] {
        match self {
            GeometryNode::Part(part) => &part.bom,
            GeometryNode::Assembly { bom, .. } => bom,
        }
    }

    /// Every part, depth first
    pub fn leaves(&self) -> Vec<&Part> {
        match self {
            GeometryNode::Part(part) => vec![part],
            GeometryNode::Assembly { children, .. } => {
                children.iter().flat_map(GeometryNode::leaves).collect()
            }
        }
    }

    /// Rebuild the tree with `action` applied to every part.
    pub fn act_on_leaves<F>(&self, action: &F) -> Result<GeometryNode, GeometryError>
    where
        F: Fn(&Part) -> Result<Part, GeometryError>,
    {
        Ok(match self {
            GeometryNode::Part(part) => GeometryNode::Part(action(part)?),
            GeometryNode::Assembly {
                children,
                tags,
                bom,
            } => GeometryNode::Assembly {
                children: children
                    .iter()
                    .map(|c| c.act_on_leaves(action))
                    .collect::<Result<_, _>>()?,
                tags: tags.clone(),
                bom: bom.clone(),
            },
        })
    }

    /// True when the geometry is solid; judged by the first part.
    pub fn is_solid(&self) -> bool {
        self.leaves().first().is_some_and(|p| p.shape.is_solid())
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.leaves()
            .iter()
            .filter_map(|p| p.shape.bounding_box())
            .reduce(|a, b| a.union(&b))
    }

    /// Copy with `new_tags` placed in front of the existing tags
    pub fn tagged(&self, new_tags: &[String]) -> GeometryNode {
        let mut node = self.clone();
        let tags = match &mut node {
            GeometryNode::Part(part) => &mut part.tags,
            GeometryNode::Assembly { tags, .. } => tags,
        };
        tags.splice(0..0, new_tags.iter().cloned());
        node
    }

    /// Copy with one more BOM line
    pub fn with_bom_entry(&self, entry: BomEntry) -> GeometryNode {
        let mut node = self.clone();
        match &mut node {
            GeometryNode::Part(part) => part.bom.push(entry),
            GeometryNode::Assembly { bom, .. } => bom.push(entry),
        }
        node
    }

    /// Sub-tree holding only the branches that carry `tag`.
    pub fn extract_tag(&self, tag: &str) -> Option<GeometryNode> {
        if self.tags().iter().any(|t| t == tag) {
            return Some(self.clone());
        }
        match self {
            GeometryNode::Part(_) => None,
            GeometryNode::Assembly {
                children,
                tags,
                bom,
            } => {
                let kept: Vec<GeometryNode> =
                    children.iter().filter_map(|c| c.extract_tag(tag)).collect();
                (!kept.is_empty()).then(|| GeometryNode::Assembly {
                    children: kept,
                    tags: tags.clone(),
                    bom: bom.clone(),
                })
            }
        }
    }

    /// Cut every part of this node with every part of `cutter`.
    pub fn difference(&self, cutter: &GeometryNode) -> Result<GeometryNode, GeometryError> {
        let cutting: Vec<&Part> = cutter.leaves();
        self.act_on_leaves(&|part: &Part| {
            let mut shape = part.shape.clone();
            for tool in &cutting {
                shape = shape.difference(&tool.shape)?;
            }
            Ok(part.with_shape(shape))
        })
    }

    /// Group inputs into an assembly. Earlier inputs are cut by later ones
    /// so that no two members overlap.
    pub fn assembly(inputs: &[GeometryNode]) -> Result<GeometryNode, GeometryError> {
        if inputs.is_empty() {
            return Err(GeometryError::NothingConnected);
        }
        let solid = inputs[0].is_solid();
        if inputs.iter().any(|i| i.is_solid() != solid) {
            return Err(GeometryError::IncompatibleInputs {
                reason: "Assemblies must be composed from only sketches OR only solids".to_string(),
            });
        }

        let mut children = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            let mut cut = input.clone();
            for later in &inputs[i + 1..] {
                cut = cut.difference(later)?;
            }
            children.push(cut);
        }
        let bom = inputs.iter().flat_map(|i| i.bom().iter().cloned()).collect();
        Ok(GeometryNode::Assembly {
            children,
            tags: Vec::new(),
            bom,
        })
    }
}
