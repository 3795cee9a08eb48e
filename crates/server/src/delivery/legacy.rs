//! Extraction from the bundled multi-collection legacy artifact.
//!
//! The bundle is a module source with one line per collection:
//!
//! ```text
//! export const posts = "<base64 gzip payload>"
//! ```

/// Find the payload exported for `collection` in `bundle`.
///
/// Only a line that starts exactly with `export const <collection> = "` matches,
/// so `posts` never picks up `posts_archive`. A trailing `;` is tolerated.
pub fn extract_export<'a>(bundle: &'a str, collection: &str) -> Option<&'a str> {
    let prefix = format!("export const {collection} = \"");
    bundle.lines().find_map(|line| {
        let rest = line.strip_prefix(prefix.as_str())?;
        rest.strip_suffix("\";").or_else(|| rest.strip_suffix('"'))
    })
}
