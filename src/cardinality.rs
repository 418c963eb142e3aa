use std::fmt::Write as FmtWrite;

use serde::{Deserialize, Serialize};

/// Participation/multiplicity classification of an ER relationship edge.
///
/// The vocabulary is closed: 18 values in five families. Values arriving
/// from imported files are parsed leniently ([`Cardinality::parse_lenient`])
/// because legacy diagrams may carry strings outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    // Basic
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
    // Mandatory
    MandatoryOneToOne,
    MandatoryOneToMany,
    MandatoryManyToOne,
    MandatoryManyToMany,
    // Optional
    OptionalZeroToOne,
    OptionalZeroToMany,
    OptionalManyToMany,
    // Mixed
    OneMandatoryManyOptional,
    ZeroToOne,
    ZeroToMany,
    OneOrMany,
    // Recursive (self-referencing relationships keep plain markers)
    RecursiveOneToOne,
    RecursiveOneToMany,
    RecursiveManyToMany,
}

/// Endpoint glyphs of crow's-foot notation. Every kind has two orientation
/// variants so it reads correctly at either end of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerKind {
    One,
    Many,
    MandatoryOne,
    MandatoryMany,
    OptionalZero,
    OptionalOne,
    OptionalMany,
}

/// Which end of an edge path a marker decorates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOrientation {
    /// Points backward, toward the source node.
    Start,
    /// Points forward, toward the target node.
    End,
}

impl Cardinality {
    pub const ALL: [Cardinality; 18] = [
        Cardinality::OneToOne,
        Cardinality::OneToMany,
        Cardinality::ManyToOne,
        Cardinality::ManyToMany,
        Cardinality::MandatoryOneToOne,
        Cardinality::MandatoryOneToMany,
        Cardinality::MandatoryManyToOne,
        Cardinality::MandatoryManyToMany,
        Cardinality::OptionalZeroToOne,
        Cardinality::OptionalZeroToMany,
        Cardinality::OptionalManyToMany,
        Cardinality::OneMandatoryManyOptional,
        Cardinality::ZeroToOne,
        Cardinality::ZeroToMany,
        Cardinality::OneOrMany,
        Cardinality::RecursiveOneToOne,
        Cardinality::RecursiveOneToMany,
        Cardinality::RecursiveManyToMany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::OneToOne => "one-to-one",
            Cardinality::OneToMany => "one-to-many",
            Cardinality::ManyToOne => "many-to-one",
            Cardinality::ManyToMany => "many-to-many",
            Cardinality::MandatoryOneToOne => "mandatory-one-to-one",
            Cardinality::MandatoryOneToMany => "mandatory-one-to-many",
            Cardinality::MandatoryManyToOne => "mandatory-many-to-one",
            Cardinality::MandatoryManyToMany => "mandatory-many-to-many",
            Cardinality::OptionalZeroToOne => "optional-zero-to-one",
            Cardinality::OptionalZeroToMany => "optional-zero-to-many",
            Cardinality::OptionalManyToMany => "optional-many-to-many",
            Cardinality::OneMandatoryManyOptional => "one-mandatory-many-optional",
            Cardinality::ZeroToOne => "zero-to-one",
            Cardinality::ZeroToMany => "zero-to-many",
            Cardinality::OneOrMany => "one-or-many",
            Cardinality::RecursiveOneToOne => "recursive-one-to-one",
            Cardinality::RecursiveOneToMany => "recursive-one-to-many",
            Cardinality::RecursiveManyToMany => "recursive-many-to-many",
        }
    }

    /// Parse a cardinality string, falling back to `one-to-many` for any
    /// value outside the vocabulary. Imported diagrams are less trusted than
    /// the editor, so unknown values degrade rather than fail.
    pub fn parse_lenient(raw: &str) -> Cardinality {
        Cardinality::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == raw.trim())
            .unwrap_or(Cardinality::OneToMany)
    }

    /// Marker drawn at the source endpoint, pointing backward.
    pub fn source_marker(&self) -> MarkerKind {
        self.marker_pair().0
    }

    /// Marker drawn at the target endpoint, pointing forward.
    pub fn target_marker(&self) -> MarkerKind {
        self.marker_pair().1
    }

    pub fn marker_pair(&self) -> (MarkerKind, MarkerKind) {
        use Cardinality::*;
        use MarkerKind::*;
        match self {
            OneToOne | RecursiveOneToOne => (One, One),
            OneToMany | RecursiveOneToMany => (One, Many),
            ManyToOne => (Many, One),
            ManyToMany | RecursiveManyToMany => (Many, Many),
            MandatoryOneToOne => (MandatoryOne, MandatoryOne),
            MandatoryOneToMany => (MandatoryOne, MandatoryMany),
            MandatoryManyToOne => (MandatoryMany, MandatoryOne),
            MandatoryManyToMany => (MandatoryMany, MandatoryMany),
            OptionalZeroToOne => (OptionalZero, OptionalOne),
            OptionalZeroToMany => (OptionalZero, OptionalMany),
            OptionalManyToMany => (OptionalMany, OptionalMany),
            OneMandatoryManyOptional => (MandatoryOne, OptionalMany),
            ZeroToOne => (OptionalZero, One),
            ZeroToMany => (OptionalZero, Many),
            OneOrMany => (One, MandatoryMany),
        }
    }
}

/// Documented fallback for out-of-vocabulary strings: source side.
pub fn source_marker_for(raw: &str) -> MarkerKind {
    Cardinality::parse_lenient(raw).source_marker()
}

/// Documented fallback for out-of-vocabulary strings: target side.
pub fn target_marker_for(raw: &str) -> MarkerKind {
    Cardinality::parse_lenient(raw).target_marker()
}

// Marker glyphs live in a 20x16 box with the stroke centerline at y=8; the
// node sits past x=20 for the end orientation. Start markers mirror x.
const MARKER_BOX_W: f32 = 20.0;

impl MarkerKind {
    pub const ALL: [MarkerKind; 7] = [
        MarkerKind::One,
        MarkerKind::Many,
        MarkerKind::MandatoryOne,
        MarkerKind::MandatoryMany,
        MarkerKind::OptionalZero,
        MarkerKind::OptionalOne,
        MarkerKind::OptionalMany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerKind::One => "one",
            MarkerKind::Many => "many",
            MarkerKind::MandatoryOne => "mandatory-one",
            MarkerKind::MandatoryMany => "mandatory-many",
            MarkerKind::OptionalZero => "optional-zero",
            MarkerKind::OptionalOne => "optional-one",
            MarkerKind::OptionalMany => "optional-many",
        }
    }

    /// SVG marker element id for one orientation, referenced by edge paths
    /// as `url(#card-<kind>-<start|end>)`.
    pub fn marker_id(&self, orientation: MarkerOrientation) -> String {
        let suffix = match orientation {
            MarkerOrientation::Start => "start",
            MarkerOrientation::End => "end",
        };
        format!("card-{}-{suffix}", self.as_str())
    }

    fn strokes(&self) -> (&'static [(f32, f32, f32, f32)], Option<(f32, f32)>) {
        match self {
            MarkerKind::One => (&[(10.0, 2.0, 10.0, 14.0)], None),
            MarkerKind::Many => (
                &[
                    (6.0, 8.0, 18.0, 2.0),
                    (6.0, 8.0, 18.0, 8.0),
                    (6.0, 8.0, 18.0, 14.0),
                ],
                None,
            ),
            MarkerKind::MandatoryOne => {
                (&[(7.0, 2.0, 7.0, 14.0), (12.0, 2.0, 12.0, 14.0)], None)
            }
            MarkerKind::MandatoryMany => (
                &[
                    (5.0, 2.0, 5.0, 14.0),
                    (6.0, 8.0, 18.0, 2.0),
                    (6.0, 8.0, 18.0, 8.0),
                    (6.0, 8.0, 18.0, 14.0),
                ],
                None,
            ),
            MarkerKind::OptionalZero => (&[], Some((10.0, 8.0))),
            MarkerKind::OptionalOne => (&[(13.0, 2.0, 13.0, 14.0)], Some((6.0, 8.0))),
            MarkerKind::OptionalMany => (
                &[
                    (8.0, 8.0, 18.0, 2.0),
                    (8.0, 8.0, 18.0, 8.0),
                    (8.0, 8.0, 18.0, 14.0),
                ],
                Some((4.0, 8.0)),
            ),
        }
    }

    /// Render a single `<marker>` element. Start-orientation glyphs are the
    /// mirror image of end-orientation ones so the notation reads toward the
    /// node at both ends.
    pub fn svg_marker(&self, orientation: MarkerOrientation) -> String {
        let (segments, circle) = self.strokes();
        let mirror = |x: f32| match orientation {
            MarkerOrientation::Start => MARKER_BOX_W - x,
            MarkerOrientation::End => x,
        };
        let ref_x = match orientation {
            MarkerOrientation::Start => 1.0,
            MarkerOrientation::End => 19.0,
        };

        let mut out = format!(
            "<marker id=\"{}\" markerWidth=\"20\" markerHeight=\"16\" refX=\"{:.0}\" refY=\"8\" orient=\"auto\" markerUnits=\"userSpaceOnUse\">",
            self.marker_id(orientation),
            ref_x
        );
        for (x1, y1, x2, y2) in segments {
            let _ = write!(
                out,
                "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"context-stroke\" stroke-width=\"1.5\" />",
                mirror(*x1),
                y1,
                mirror(*x2),
                y2
            );
        }
        if let Some((cx, cy)) = circle {
            let _ = write!(
                out,
                "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"white\" stroke=\"context-stroke\" stroke-width=\"1.5\" />",
                mirror(cx),
                cy
            );
        }
        out.push_str("</marker>");
        out
    }

    /// All fourteen marker defs (seven kinds, two orientations each).
    pub fn svg_defs() -> String {
        let mut out = String::new();
        for kind in MarkerKind::ALL {
            out.push_str(&kind.svg_marker(MarkerOrientation::Start));
            out.push('\n');
            out.push_str(&kind.svg_marker(MarkerOrientation::End));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_total_over_the_vocabulary() {
        for cardinality in Cardinality::ALL {
            // marker_pair is a match with no wildcard arm, so this mostly
            // guards the ALL list staying in sync with the enum.
            let (source, target) = cardinality.marker_pair();
            assert_eq!(cardinality.source_marker(), source);
            assert_eq!(cardinality.target_marker(), target);
        }
    }

    #[test]
    fn unknown_values_fall_back_to_one_many() {
        assert_eq!(source_marker_for("tree-to-forest"), MarkerKind::One);
        assert_eq!(target_marker_for("tree-to-forest"), MarkerKind::Many);
        assert_eq!(
            Cardinality::parse_lenient("definitely-not-a-cardinality"),
            Cardinality::OneToMany
        );
    }

    #[test]
    fn lenient_parse_accepts_every_canonical_name() {
        for cardinality in Cardinality::ALL {
            assert_eq!(Cardinality::parse_lenient(cardinality.as_str()), cardinality);
        }
    }

    #[test]
    fn serde_names_match_as_str() {
        for cardinality in Cardinality::ALL {
            let json = serde_json::to_string(&cardinality).unwrap();
            assert_eq!(json, format!("\"{}\"", cardinality.as_str()));
        }
    }

    #[test]
    fn mandatory_family_doubles_the_stroke() {
        let (source, target) = Cardinality::MandatoryOneToMany.marker_pair();
        assert_eq!(source, MarkerKind::MandatoryOne);
        assert_eq!(target, MarkerKind::MandatoryMany);
    }

    #[test]
    fn start_markers_mirror_end_markers() {
        let end = MarkerKind::Many.svg_marker(MarkerOrientation::End);
        let start = MarkerKind::Many.svg_marker(MarkerOrientation::Start);
        assert!(end.contains("card-many-end"));
        assert!(start.contains("card-many-start"));
        // the foot opens toward x=20 at the end, toward x=0 at the start
        assert!(end.contains("x2=\"18.0\""));
        assert!(start.contains("x2=\"2.0\""));
    }

    #[test]
    fn defs_contain_both_orientations_for_every_kind() {
        let defs = MarkerKind::svg_defs();
        for kind in MarkerKind::ALL {
            assert!(defs.contains(&kind.marker_id(MarkerOrientation::Start)));
            assert!(defs.contains(&kind.marker_id(MarkerOrientation::End)));
        }
    }
}
