//! Resolution of font requests to shared font resources
//!
//! A lookup tries, in order, stopping at the first success:
//! 1. a registered resource with the exact family, weight and style
//! 2. an exact definition from the factory, registered as a new resource
//! 3. a substitute remembered for the request (substitution enabled only),
//!    then a Courier fallback remembered for it
//! 4. the closest face of the family by weight and style (substitution enabled only)
//! 5. Courier, bold at or above semi-bold and italic when requested
//!
//! Without `create` only steps 1 and 3 run.

use crate::{Font, FontDefinition, FontFactory, FontResource, FontResourceSet, FontStyle, FontWeight, StandardFont};
use std::rc::Rc;

/// Added to the weight distance when the style differs, so any style match
/// is closer than every style mismatch.
const STYLE_MISMATCH_PENALTY: u32 = 1000;

/// How a lookup was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The requested face itself
    Exact,
    /// Another face of the family; `proximity` is `None` when the substitute was remembered from an earlier lookup
    Substituted { proximity: Option<u32> },
    /// Courier, after the factory and substitution both failed
    Fallback,
}

/// A resolved font
#[derive(Debug, Clone)]
pub struct FontMatch {
    pub resource: Rc<FontResource>,
    pub outcome: MatchOutcome,
}

enum Candidate {
    Registered(Rc<FontResource>),
    Loadable(FontDefinition),
}

impl Candidate {
    fn definition(&self) -> &FontDefinition {
        match self {
            Candidate::Registered(resource) => resource.definition(),
            Candidate::Loadable(definition) => definition,
        }
    }
}

/// Matches font requests against a document's font resources and a factory
pub struct FontMatcher {
    factory: Box<dyn FontFactory>,
    substitution: bool,
}

impl std::fmt::Debug for FontMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMatcher")
            .field("substitution", &self.substitution)
            .finish_non_exhaustive()
    }
}

impl FontMatcher {
    pub fn new(factory: impl FontFactory + 'static, substitution: bool) -> Self {
        Self {
            factory: Box::new(factory),
            substitution,
        }
    }

    pub fn substitution_enabled(&self) -> bool {
        self.substitution
    }

    pub fn set_substitution(&mut self, enabled: bool) {
        self.substitution = enabled;
    }

    /// Resolve `font`, storing the resource on it. Returns `None`, with the
    /// font's resource cleared, when nothing matched and `create` is false.
    pub fn get_font(&self, font: &mut Font, resources: &mut FontResourceSet, create: bool) -> Option<FontMatch> {
        let found = self.resolve(font, resources, create);
        match &found {
            Some(matched) => font.set_resource(Rc::clone(&matched.resource)),
            None => font.clear_resource(),
        }
        found
    }

    fn resolve(&self, font: &Font, resources: &mut FontResourceSet, create: bool) -> Option<FontMatch> {
        let (weight, style) = (font.weight(), font.style());

        for family in font.selector().families() {
            if let Some(resource) = resources.find_exact(family, weight, style) {
                return Some(exact(resource));
            }
        }

        if create {
            for family in font.selector().families() {
                if let Some(definition) = self.factory.load_exact(family, weight, style) {
                    return Some(exact(resources.register(definition)));
                }
            }
        }

        if self.substitution {
            for family in font.selector().families() {
                if let Some(resource) = resources.find_substitute(&font.key_for(family)) {
                    tracing::warn!(
                        font = %font,
                        substitute = %resource.full_name(),
                        "font not found, using remembered substitute"
                    );
                    return Some(FontMatch {
                        resource,
                        outcome: MatchOutcome::Substituted { proximity: None },
                    });
                }
            }
        }

        if let Some(resource) = resources.find_fallback(&font.key_for(font.selector().primary())) {
            tracing::error!(
                font = %font,
                fallback = %resource.full_name(),
                "font not found, using remembered Courier fallback"
            );
            return Some(FontMatch {
                resource,
                outcome: MatchOutcome::Fallback,
            });
        }

        if !create {
            return None;
        }

        let primary_key = font.key_for(font.selector().primary());

        if self.substitution {
            if let Some((candidate, proximity)) = self.closest(font, resources) {
                let resource = match candidate {
                    Candidate::Registered(resource) => resource,
                    Candidate::Loadable(definition) => resources.register(definition),
                };
                tracing::warn!(
                    font = %font,
                    substitute = %resource.full_name(),
                    proximity,
                    "font not found, substituting closest face"
                );
                resources.remember_substitution(primary_key, Rc::clone(&resource));
                return Some(FontMatch {
                    resource,
                    outcome: MatchOutcome::Substituted {
                        proximity: Some(proximity),
                    },
                });
            }
        }

        let courier = StandardFont::courier(weight, style);
        let resource = resources.register(FontDefinition::standard(courier));
        tracing::error!(
            font = %font,
            fallback = courier.pdf_name(),
            "font not found and no substitute available, falling back to Courier"
        );
        resources.remember_fallback(primary_key, Rc::clone(&resource));
        Some(FontMatch {
            resource,
            outcome: MatchOutcome::Fallback,
        })
    }

    /// Closest face across registered resources and factory definitions of
    /// the selector's families. When no candidate has the requested style the
    /// search is repeated as if Regular had been requested.
    fn closest(&self, font: &Font, resources: &FontResourceSet) -> Option<(Candidate, u32)> {
        let mut candidates = Vec::new();
        for family in font.selector().families() {
            candidates.extend(resources.family(family).cloned().map(Candidate::Registered));
            candidates.extend(
                self.factory
                    .family_definitions(family)
                    .into_iter()
                    .map(Candidate::Loadable),
            );
        }

        let style = if candidates.iter().any(|c| c.definition().style() == font.style()) {
            font.style()
        } else {
            FontStyle::Regular
        };

        candidates
            .into_iter()
            .map(|c| {
                let score = proximity(font.weight(), style, c.definition());
                (c, score)
            })
            .min_by_key(|(_, score)| *score)
    }
}

/// Distance between a requested weight/style and a face
pub fn proximity(weight: FontWeight, style: FontStyle, candidate: &FontDefinition) -> u32 {
    let penalty = if candidate.style() == style { 0 } else { STYLE_MISMATCH_PENALTY };
    weight.distance(candidate.weight()) + penalty
}

fn exact(resource: Rc<FontResource>) -> FontMatch {
    FontMatch {
        resource,
        outcome: MatchOutcome::Exact,
    }
}
