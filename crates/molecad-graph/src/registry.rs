//! Atom kinds and their factories.

use std::fmt;

use crate::atom::AtomBody;
use crate::atoms::{
    AddBomTagAtom, AssemblyAtom, CircleAtom, ConstantAtom, CutLayoutAtom, DifferenceAtom,
    EquationAtom, ExtractTagAtom, ExtrudeAtom, InputAtom, MoveAtom, OutputAtom,
    RectangleAtom, RegularPolygonAtom, RotateAtom, TagAtom,
};
use crate::context::Environment;
use crate::molecule::Molecule;

/// Every kind of atom a project can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomType {
    Input,
    Output,
    Constant,
    Equation,
    Rectangle,
    Circle,
    RegularPolygon,
    Extrude,
    Move,
    Rotate,
    Difference,
    Tag,
    ExtractTag,
    Assembly,
    AddBomTag,
    CutLayout,
    Molecule,
}

impl AtomType {
    pub const ALL: [AtomType; 17] = [
        AtomType::Input,
        AtomType::Output,
        AtomType::Constant,
        AtomType::Equation,
        AtomType::Rectangle,
        AtomType::Circle,
        AtomType::RegularPolygon,
        AtomType::Extrude,
        AtomType::Move,
        AtomType::Rotate,
        AtomType::Difference,
        AtomType::Tag,
        AtomType::ExtractTag,
        AtomType::Assembly,
        AtomType::AddBomTag,
        AtomType::CutLayout,
        AtomType::Molecule,
    ];

    /// Tag written to `atomType` in project files
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::Constant => "Constant",
            Self::Equation => "Equation",
            Self::Rectangle => "Rectangle",
            Self::Circle => "Circle",
            Self::RegularPolygon => "RegularPolygon",
            Self::Extrude => "Extrude",
            Self::Move => "Move",
            Self::Rotate => "Rotate",
            Self::Difference => "Difference",
            Self::Tag => "Tag",
            Self::ExtractTag => "ExtractTag",
            Self::Assembly => "Assembly",
            Self::AddBomTag => "AddBOMTag",
            Self::CutLayout => "Cut Layout",
            Self::Molecule => "Molecule",
        }
    }

    /// Look up a persisted tag, including legacy aliases
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Join" | "Union" => Some(Self::Assembly),
            "CutLayout" => Some(Self::CutLayout),
            "Add-BOM-Tag" | "Add BOM Tag" => Some(Self::AddBomTag),
            "Extract Tag" => Some(Self::ExtractTag),
            other => Self::ALL.into_iter().find(|t| t.tag() == other),
        }
    }

    pub fn default_name(&self) -> &'static str {
        match self {
            Self::Input => "name",
            Self::Output => "Output",
            Self::Constant => "Constant",
            Self::Equation => "x + y",
            Self::Rectangle => "Rectangle",
            Self::Circle => "Circle",
            Self::RegularPolygon => "Regular Polygon",
            Self::Extrude => "Extrude",
            Self::Move => "Move",
            Self::Rotate => "Rotate",
            Self::Difference => "Difference",
            Self::Tag => "Tag",
            Self::ExtractTag => "Extract Tag",
            Self::Assembly => "Assembly",
            Self::AddBomTag => "Add BOM Tag",
            Self::CutLayout => "Cut Layout",
            Self::Molecule => "Molecule",
        }
    }

    pub fn create(&self, env: &Environment) -> AtomBody {
        match self {
            Self::Input => AtomBody::Leaf(Box::<InputAtom>::default()),
            Self::Output => AtomBody::Leaf(Box::new(OutputAtom)),
            Self::Constant => AtomBody::Leaf(Box::<ConstantAtom>::default()),
            Self::Equation => AtomBody::Leaf(Box::<EquationAtom>::default()),
            Self::Rectangle => AtomBody::Leaf(Box::new(RectangleAtom)),
            Self::Circle => AtomBody::Leaf(Box::new(CircleAtom)),
            Self::RegularPolygon => AtomBody::Leaf(Box::new(RegularPolygonAtom)),
            Self::Extrude => AtomBody::Leaf(Box::new(ExtrudeAtom)),
            Self::Move => AtomBody::Leaf(Box::new(MoveAtom)),
            Self::Rotate => AtomBody::Leaf(Box::new(RotateAtom)),
            Self::Difference => AtomBody::Leaf(Box::new(DifferenceAtom)),
            Self::Tag => AtomBody::Leaf(Box::new(TagAtom)),
            Self::ExtractTag => AtomBody::Leaf(Box::new(ExtractTagAtom)),
            Self::Assembly => AtomBody::Leaf(Box::new(AssemblyAtom)),
            Self::AddBomTag => AtomBody::Leaf(Box::new(AddBomTagAtom)),
            Self::CutLayout => AtomBody::Leaf(Box::<CutLayoutAtom>::default()),
            Self::Molecule => AtomBody::Molecule(Box::new(Molecule::new(env.units))),
        }
    }
}

impl fmt::Display for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for atom_type in AtomType::ALL {
            assert_eq!(AtomType::from_tag(atom_type.tag()), Some(atom_type));
        }
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(AtomType::from_tag("Join"), Some(AtomType::Assembly));
        assert_eq!(AtomType::from_tag("CutLayout"), Some(AtomType::CutLayout));
        assert_eq!(AtomType::from_tag("Gcode"), None);
    }

    #[test]
    fn test_factories_match_their_type() {
        let env = Environment::default();
        for atom_type in AtomType::ALL {
            let body = atom_type.create(&env);
            let created = match &body {
                AtomBody::Leaf(behavior) => behavior.atom_type(),
                AtomBody::Molecule(_) => AtomType::Molecule,
            };
            assert_eq!(created, atom_type);
        }
    }
}
