//! Route table validation.
//!
//! Every check runs and every failure is reported, so a broken table is
//! fixed in one pass.

use super::error::RouteMapError;
use crate::recognizer::route_map::{split_path, Segment};
use crate::recognizer::RouteDefinition;
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<RouteMapError>>;

fn check(ok: bool, error: impl FnOnce() -> RouteMapError) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(error())
    }
}

/// Validate a nested route table.
pub(crate) fn validate_definitions(definitions: &[RouteDefinition]) -> Check {
    let mut checks = Vec::new();
    let mut seen = HashSet::new();
    collect_checks(definitions, &[], &mut seen, &mut checks);
    Validation::all_vec(checks).map(|_| ())
}

fn collect_checks<'a>(
    definitions: &'a [RouteDefinition],
    inherited_params: &[String],
    seen: &mut HashSet<&'a str>,
    checks: &mut Vec<Check>,
) {
    for definition in definitions {
        let route = definition.name.as_str();
        checks.push(check(!route.is_empty(), || RouteMapError::EmptyName {
            path: definition.path.clone(),
        }));
        if !route.is_empty() {
            checks.push(check(seen.insert(route), || {
                RouteMapError::DuplicateName(route.to_owned())
            }));
        }

        let raw_segments: Vec<&str> = split_path(&definition.path).collect();
        let mut params = inherited_params.to_vec();
        for (i, raw) in raw_segments.iter().enumerate() {
            checks.push(check(is_well_formed(raw), || RouteMapError::MalformedSegment {
                route: route.to_owned(),
                segment: (*raw).to_owned(),
            }));

            match Segment::parse(raw) {
                Segment::Static(_) => {}
                Segment::Dynamic(name) | Segment::Star(name) if name.is_empty() => {}
                Segment::Dynamic(name) | Segment::Star(name) => {
                    let is_star = raw.starts_with('*');
                    if is_star {
                        let is_last = i + 1 == raw_segments.len() && definition.children.is_empty();
                        checks.push(check(is_last, || RouteMapError::StarNotLast {
                            route: route.to_owned(),
                        }));
                    }
                    checks.push(check(!params.contains(&name), || {
                        RouteMapError::DuplicateParam {
                            route: route.to_owned(),
                            param: name.clone(),
                        }
                    }));
                    params.push(name);
                }
            }
        }

        collect_checks(&definition.children, &params, seen, checks);
    }
}

fn is_well_formed(raw: &str) -> bool {
    let name = raw
        .strip_prefix(':')
        .or_else(|| raw.strip_prefix('*'))
        .unwrap_or(raw);
    !name.is_empty() && !raw.contains(['?', '#'])
}
