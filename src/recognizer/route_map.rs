//! The bundled route table recognizer.
//!
//! Param values and query components are percent-encoded when a URL is
//! generated and decoded when it is recognized.

use super::{
    HandlerSpec, Recognized, RecognizedHandler, Recognizer, RecognizerError, RouteDefinition,
};
use crate::builder::{validate_definitions, BuildError};
use crate::core::{Params, QueryParams, QueryValue};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::cmp::Reverse;
use std::collections::HashMap;
use stillwater::validation::Validation;

/// Escaped inside a path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escaped inside a query key or value.
const QUERY_COMPONENT: &AsciiSet = &SEGMENT
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'[')
    .add(b']');

fn encode(raw: &str, set: &'static AsciiSet) -> String {
    utf8_percent_encode(raw, set).to_string()
}

fn decode(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

/// Query components also accept `+` for a space.
fn decode_query(encoded: &str) -> String {
    decode(&encoded.replace('+', " "))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Static(String),
    Dynamic(String),
    Star(String),
}

impl Segment {
    pub(crate) fn parse(raw: &str) -> Self {
        if let Some(name) = raw.strip_prefix(':') {
            Self::Dynamic(name.to_owned())
        } else if let Some(name) = raw.strip_prefix('*') {
            Self::Star(name.to_owned())
        } else {
            Self::Static(raw.to_owned())
        }
    }

    fn param_name(&self) -> Option<&str> {
        match self {
            Self::Static(_) => None,
            Self::Dynamic(name) | Self::Star(name) => Some(name),
        }
    }
}

pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

#[derive(Debug, Clone)]
struct CompiledHandler {
    name: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    name: String,
    chain: Vec<CompiledHandler>,
}

/// Match precedence: fewer stars, more statics, fewer dynamics, deeper
/// chains, then registration order.
type Score = (usize, Reverse<usize>, usize, Reverse<usize>, usize);

impl CompiledRoute {
    fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.chain.iter().flat_map(|handler| handler.segments.iter())
    }

    fn score(&self, order: usize) -> Score {
        let (mut stars, mut statics, mut dynamics) = (0, 0, 0);
        for segment in self.segments() {
            match segment {
                Segment::Static(_) => statics += 1,
                Segment::Dynamic(_) => dynamics += 1,
                Segment::Star(_) => stars += 1,
            }
        }
        (
            stars,
            Reverse(statics),
            dynamics,
            Reverse(self.chain.len()),
            order,
        )
    }

    /// Match decoded path parts against the chain.
    fn match_parts(&self, parts: &[String]) -> Option<Vec<RecognizedHandler>> {
        let mut cursor = 0;
        let mut handlers = Vec::with_capacity(self.chain.len());

        for handler in &self.chain {
            let mut params = Params::new();
            for segment in &handler.segments {
                match segment {
                    Segment::Static(text) => {
                        if parts.get(cursor).map(String::as_str) != Some(text.as_str()) {
                            return None;
                        }
                        cursor += 1;
                    }
                    Segment::Dynamic(name) => {
                        let value = parts.get(cursor)?;
                        params.insert(name.clone(), value.clone());
                        cursor += 1;
                    }
                    Segment::Star(name) => {
                        let rest = parts.get(cursor..).unwrap_or_default();
                        if rest.is_empty() {
                            return None;
                        }
                        params.insert(name.clone(), rest.join("/"));
                        cursor = parts.len();
                    }
                }
            }
            handlers.push(RecognizedHandler {
                handler: handler.name.clone(),
                params,
            });
        }

        (cursor == parts.len()).then_some(handlers)
    }
}

/// Nested route table.
///
/// Every route in the table is addressable by name, including routes that
/// have children. A route's handler chain is its ancestors followed by
/// itself.
///
/// # Example
///
/// ```rust
/// use waypost::recognizer::{RouteMap, Recognizer};
/// use waypost::{params, query_params};
///
/// let map = RouteMap::builder()
///     .route("index", "/")
///     .nest("posts", "/posts", |posts| posts.route("post", "/:post_id"))
///     .build()
///     .unwrap();
///
/// let recognized = map.recognize("/posts/7?sort=asc").unwrap();
/// let names: Vec<_> = recognized.handlers.iter().map(|h| h.handler.as_str()).collect();
/// assert_eq!(names, ["posts", "post"]);
/// assert_eq!(recognized.query_params, query_params! { "sort" => "asc" });
///
/// let url = map.generate("post", &params! { "post_id" => 7 }, &query_params! {});
/// assert_eq!(url.unwrap(), "/posts/7");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteMap {
    routes: Vec<CompiledRoute>,
    by_name: HashMap<String, usize>,
}

impl RouteMap {
    pub fn builder() -> crate::builder::RouteMapBuilder {
        crate::builder::RouteMapBuilder::new()
    }

    /// Compile a route table, reporting every problem found in it.
    pub fn from_definitions(definitions: &[RouteDefinition]) -> Result<Self, BuildError> {
        match validate_definitions(definitions) {
            Validation::Success(_) => {
                let mut map = Self::default();
                map.compile(definitions, &[]);
                Ok(map)
            }
            Validation::Failure(errors) => {
                Err(BuildError::InvalidRouteMap(errors.iter().cloned().collect()))
            }
        }
    }

    fn compile(&mut self, definitions: &[RouteDefinition], parent: &[CompiledHandler]) {
        for definition in definitions {
            let mut chain = parent.to_vec();
            chain.push(CompiledHandler {
                name: definition.name.clone(),
                segments: split_path(&definition.path).map(Segment::parse).collect(),
            });

            self.by_name.insert(definition.name.clone(), self.routes.len());
            self.routes.push(CompiledRoute {
                name: definition.name.clone(),
                chain: chain.clone(),
            });

            self.compile(&definition.children, &chain);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.name.as_str())
    }

    fn route(&self, name: &str) -> Option<&CompiledRoute> {
        self.by_name.get(name).and_then(|&index| self.routes.get(index))
    }
}

impl Recognizer for RouteMap {
    fn recognize(&self, url: &str) -> Option<Recognized> {
        let url = url.split_once('#').map_or(url, |(before, _)| before);
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let parts: Vec<String> = split_path(path).map(decode).collect();

        let (_, handlers) = self
            .routes
            .iter()
            .enumerate()
            .filter_map(|(order, route)| {
                route
                    .match_parts(&parts)
                    .map(|handlers| (route.score(order), handlers))
            })
            .min_by(|(a, _), (b, _)| a.cmp(b))?;

        Some(Recognized {
            handlers,
            query_params: parse_query_string(query),
        })
    }

    fn generate(
        &self,
        name: &str,
        params: &Params,
        query_params: &QueryParams,
    ) -> Result<String, RecognizerError> {
        let route = self
            .route(name)
            .ok_or_else(|| RecognizerError::UnknownRoute(name.to_owned()))?;

        let mut parts = Vec::new();
        for segment in route.segments() {
            match segment {
                Segment::Static(text) => parts.push(text.clone()),
                Segment::Dynamic(param) | Segment::Star(param) => {
                    let value =
                        params
                            .get(param)
                            .ok_or_else(|| RecognizerError::MissingParam {
                                route: name.to_owned(),
                                param: param.clone(),
                            })?;
                    if value.is_empty() {
                        return Err(RecognizerError::EmptyParam {
                            route: name.to_owned(),
                            param: param.clone(),
                        });
                    }
                    parts.push(match segment {
                        Segment::Star(_) => split_path(value)
                            .map(|part| encode(part, SEGMENT))
                            .collect::<Vec<_>>()
                            .join("/"),
                        _ => encode(value, SEGMENT),
                    });
                }
            }
        }

        let mut url = format!("/{}", parts.join("/"));
        let query = to_query_string(query_params);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        Ok(url)
    }

    fn handlers_for(&self, name: &str) -> Option<Vec<HandlerSpec>> {
        self.route(name).map(|route| {
            route
                .chain
                .iter()
                .map(|handler| {
                    HandlerSpec::new(
                        handler.name.clone(),
                        handler
                            .segments
                            .iter()
                            .filter_map(Segment::param_name)
                            .map(str::to_owned)
                            .collect(),
                    )
                })
                .collect()
        })
    }

    fn has_route(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

/// Parse `a=1&flag&tags[]=x&tags[]=y`. Keys without a value are `"true"`.
pub(crate) fn parse_query_string(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, decode_query(value)),
            None => (pair, "true".to_owned()),
        };
        if let Some(key) = key.strip_suffix("[]") {
            match params
                .entry(decode_query(key))
                .or_insert_with(|| QueryValue::List(Vec::new()))
            {
                QueryValue::List(values) => values.push(value),
                single => *single = QueryValue::List(vec![value]),
            }
        } else {
            params.insert(decode_query(key), QueryValue::from(value));
        }
    }
    params
}

pub(crate) fn to_query_string(query_params: &QueryParams) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query_params {
        let key = encode(key, QUERY_COMPONENT);
        match value {
            QueryValue::Single(value) => {
                pairs.push(format!("{key}={}", encode(value, QUERY_COMPONENT)))
            }
            QueryValue::List(values) => pairs.extend(
                values
                    .iter()
                    .map(|value| format!("{key}[]={}", encode(value, QUERY_COMPONENT))),
            ),
        }
    }
    pairs.join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RouteMapError;
    use crate::{params, query_params};

    fn blog() -> RouteMap {
        RouteMap::builder()
            .route("index", "/")
            .nest("posts", "/posts", |posts| {
                posts
                    .route("posts.new", "/new")
                    .nest("post", "/:post_id", |post| {
                        post.route("comment", "/comments/:comment_id")
                    })
            })
            .route("files", "/files/*path")
            .route("about", "/about")
            .build()
            .unwrap()
    }

    fn names(recognized: &Recognized) -> Vec<&str> {
        recognized
            .handlers
            .iter()
            .map(|handler| handler.handler.as_str())
            .collect()
    }

    #[test]
    fn recognizes_nested_chain_with_params() {
        let recognized = blog().recognize("/posts/5/comments/9").unwrap();
        assert_eq!(names(&recognized), ["posts", "post", "comment"]);
        assert!(recognized.handlers[0].params.is_empty());
        assert_eq!(recognized.handlers[1].params, params! { "post_id" => 5 });
        assert_eq!(recognized.handlers[2].params, params! { "comment_id" => 9 });
    }

    #[test]
    fn static_segments_beat_dynamic_ones() {
        let recognized = blog().recognize("/posts/new").unwrap();
        assert_eq!(names(&recognized), ["posts", "posts.new"]);
    }

    #[test]
    fn star_segment_captures_the_rest() {
        let recognized = blog().recognize("/files/a/b/c.txt").unwrap();
        assert_eq!(recognized.handlers[0].params, params! { "path" => "a/b/c.txt" });
        assert!(blog().recognize("/files").is_none());
    }

    #[test]
    fn dynamic_beats_star() {
        let map = RouteMap::builder()
            .route("catchall", "/*path")
            .route("page", "/:slug")
            .build()
            .unwrap();
        let recognized = map.recognize("/hello").unwrap();
        assert_eq!(names(&recognized), ["page"]);
        let recognized = map.recognize("/hello/world").unwrap();
        assert_eq!(names(&recognized), ["catchall"]);
    }

    #[test]
    fn root_matches_empty_path() {
        let recognized = blog().recognize("/").unwrap();
        assert_eq!(names(&recognized), ["index"]);
        assert!(blog().recognize("/nothing/here").is_none());
    }

    #[test]
    fn query_string_and_fragment() {
        let recognized = blog()
            .recognize("/about?sort=asc&flag&tags[]=a&tags[]=b#top")
            .unwrap();
        assert_eq!(
            recognized.query_params,
            query_params! { "sort" => "asc", "flag" => true, "tags" => ["a", "b"] }
        );
    }

    #[test]
    fn generate_fills_segments_and_sorts_query() {
        let url = blog()
            .generate(
                "comment",
                &params! { "post_id" => 5, "comment_id" => 9 },
                &query_params! { "z" => 1, "a" => ["x", "y"] },
            )
            .unwrap();
        assert_eq!(url, "/posts/5/comments/9?a[]=x&a[]=y&z=1");
        assert_eq!(blog().generate("index", &Params::new(), &QueryParams::new()).unwrap(), "/");
    }

    #[test]
    fn generate_reports_missing_params_and_unknown_routes() {
        assert_eq!(
            blog().generate("post", &Params::new(), &QueryParams::new()),
            Err(RecognizerError::MissingParam {
                route: "post".into(),
                param: "post_id".into()
            })
        );
        assert_eq!(
            blog().generate("ghost", &Params::new(), &QueryParams::new()),
            Err(RecognizerError::UnknownRoute("ghost".into()))
        );
    }

    #[test]
    fn reserved_characters_are_escaped_and_restored() {
        let map = blog();
        for post_id in ["a/b", "x?y=1", "a#b", "50%", "two words", "caf\u{e9}"] {
            let url = map
                .generate("post", &params! { "post_id" => post_id }, &QueryParams::new())
                .unwrap();
            let recognized = map.recognize(&url).unwrap();
            assert_eq!(names(&recognized), ["posts", "post"], "{url}");
            assert_eq!(recognized.handlers[1].params, params! { "post_id" => post_id });
        }
        assert_eq!(
            map.generate("post", &params! { "post_id" => "a/b" }, &QueryParams::new()),
            Ok("/posts/a%2Fb".to_string())
        );
    }

    #[test]
    fn query_components_are_escaped_and_restored() {
        let query = query_params! { "q" => "a&b=c", "a b" => "1+1", "list[]" => ["x]", "#"] };
        let url = blog().generate("about", &Params::new(), &query).unwrap();
        assert_eq!(blog().recognize(&url).unwrap().query_params, query);
        assert_eq!(
            blog().recognize("/about?q=a+b").unwrap().query_params,
            query_params! { "q" => "a b" }
        );
    }

    #[test]
    fn star_segments_escape_each_part() {
        let url = blog()
            .generate("files", &params! { "path" => "docs/a b.txt" }, &QueryParams::new())
            .unwrap();
        assert_eq!(url, "/files/docs/a%20b.txt");
        assert_eq!(
            blog().recognize(&url).unwrap().handlers[0].params,
            params! { "path" => "docs/a b.txt" }
        );
    }

    #[test]
    fn empty_params_are_rejected() {
        assert_eq!(
            blog().generate("post", &params! { "post_id" => "" }, &QueryParams::new()),
            Err(RecognizerError::EmptyParam {
                route: "post".into(),
                param: "post_id".into()
            })
        );
    }

    #[test]
    fn handlers_for_lists_dynamic_names() {
        let specs = blog().handlers_for("comment").unwrap();
        assert_eq!(
            specs,
            vec![
                HandlerSpec::new("posts", vec![]),
                HandlerSpec::new("post", vec!["post_id".into()]),
                HandlerSpec::new("comment", vec!["comment_id".into()]),
            ]
        );
        assert!(blog().handlers_for("ghost").is_none());
    }

    #[test]
    fn invalid_definitions_report_every_problem() {
        let definitions = vec![
            RouteDefinition::new("a", "/:"),
            RouteDefinition::new("a", "/*rest/more"),
        ];
        match RouteMap::from_definitions(&definitions) {
            Err(BuildError::InvalidRouteMap(errors)) => {
                assert!(errors.contains(&RouteMapError::DuplicateName("a".into())));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, RouteMapError::MalformedSegment { .. })));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, RouteMapError::StarNotLast { .. })));
            }
            other => panic!("expected invalid route map, got {other:?}"),
        }
    }
}
