use tracing::warn;

/// Entry route; also where unknown roles land.
pub const FALLBACK_ROUTE: &str = "/login";

/// Role to landing page. Roles outside this table are valid data but route to [`FALLBACK_ROUTE`].
pub const ROLE_ROUTES: &[(&str, &str)] = &[
    ("admin", "/admin"),
    ("candidate", "/candidate"),
    ("manager", "/manager"),
    ("ring", "/ring"),
    ("voter", "/voter"),
];

pub fn resolve_route(role: Option<&str>) -> &'static str {
    let Some(role) = role else { return FALLBACK_ROUTE; };
    match ROLE_ROUTES.iter().find(|(r, _)| *r == role) {
        Some((_, path)) => *path,
        None => {
            if !role.is_empty() {
                warn!(target: "auth", "no route configured for role '{}', sending to {}", role, FALLBACK_ROUTE);
            }
            FALLBACK_ROUTE
        }
    }
}
