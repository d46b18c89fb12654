//! Server-level patches: the root-location rewrite and the proxy location
//!
//! ```text
//! location / {
//!     if ($prerender = 1) {
//!         rewrite (.*) /prerenderio last;
//!     }
//!     ...
//! }
//! location /prerenderio {
//!     ...
//!     proxy_pass https://$prerender_host;
//! }
//! ```

use super::{upsert, Applied};
use crate::error::{Error, Result};
use crate::locator::{find_location_block_mut, location_index};
use crate::tree::DirectiveNode;

/// Path of the internal location proxying to Prerender
pub const PRERENDER_LOCATION: &str = "/prerenderio";

/// Value sent as `X-Prerender-Int-Type`
pub const PRERENDER_INT_TYPE: &str = "nginx_auto_installer";

/// The `if ($prerender = 1)` guard prepended to `location /`
pub fn root_rewrite() -> DirectiveNode {
    DirectiveNode::block(
        "if",
        ["$prerender", "=", "1"],
        vec![DirectiveNode::new("rewrite", ["(.*)", PRERENDER_LOCATION, "last"])],
    )
}

/// The `location /prerenderio` block carrying `token`
pub fn prerender_location(token: &str) -> DirectiveNode {
    DirectiveNode::block(
        "location",
        [PRERENDER_LOCATION],
        vec![
            DirectiveNode::block(
                "if",
                ["$prerender", "=", "0"],
                vec![DirectiveNode::new("return", ["404"])],
            ),
            DirectiveNode::new("proxy_set_header", ["X-Prerender-Token", token]),
            DirectiveNode::new("proxy_set_header", ["X-Prerender-Int-Type", PRERENDER_INT_TYPE]),
            DirectiveNode::new("proxy_hide_header", ["Cache-Control"]),
            DirectiveNode::new("add_header", ["Cache-Control", "private,max-age=600,must-revalidate"]),
            DirectiveNode::new("resolver", ["8.8.8.8", "8.8.4.4"]),
            DirectiveNode::new("set", ["$prerender_host", "service.prerender.io"]),
            DirectiveNode::new("proxy_pass", ["https://$prerender_host"]),
            DirectiveNode::new("rewrite", [".*", "/$scheme://$host$request_uri?", "break"]),
        ],
    )
}

/// Prepend (or refresh) the prerender rewrite in the server's `location /`
pub fn rewrite_root_location(server: &mut DirectiveNode) -> Result<Applied> {
    let root = find_location_block_mut(server, "/")?;
    Ok(upsert(root.children_mut(), root_rewrite(), 0))
}

/// Add (or refresh) `location /prerenderio` right after `location /`
///
/// The token is written verbatim. Fails without touching the tree when the
/// token is blank or the server has no `location /` to anchor on.
pub fn add_prerender_location(server: &mut DirectiveNode, token: &str) -> Result<Applied> {
    if token.trim().is_empty() {
        return Err(Error::MissingToken);
    }
    let anchor = location_index(server, "/").ok_or_else(|| {
        Error::NotFound("no location block found for / in the server block".to_string())
    })?;
    Ok(upsert(server.children_mut(), prerender_location(token), anchor + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_server() -> DirectiveNode {
        DirectiveNode::section(
            "server",
            vec![
                DirectiveNode::new("listen", ["80"]),
                DirectiveNode::new("server_name", ["example.com"]),
                DirectiveNode::block("location", ["/api"], vec![DirectiveNode::new("proxy_pass", ["http://app"])]),
                DirectiveNode::block(
                    "location",
                    ["/"],
                    vec![DirectiveNode::new("try_files", ["$uri", "$uri/", "/index.html"])],
                ),
                DirectiveNode::new("error_page", ["404", "/404.html"]),
            ],
        )
    }

    #[test]
    fn test_root_rewrite_prepended() {
        let mut server = sample_server();
        let applied = rewrite_root_location(&mut server).unwrap();
        assert_eq!(applied, Applied::Inserted(0));

        let root = &server.children()[3];
        assert_eq!(root.children().len(), 2);
        assert!(root.children()[0].matches("if", &["$prerender", "=", "1"]));
        assert!(root.children()[0].children()[0].matches("rewrite", &["(.*)", "/prerenderio", "last"]));
        assert_eq!(root.children()[1].name, "try_files");
    }

    #[test]
    fn test_root_rewrite_refreshes_existing_guard() {
        let mut server = DirectiveNode::section(
            "server",
            vec![DirectiveNode::block(
                "location",
                ["/"],
                vec![
                    DirectiveNode::new("root", ["/srv"]),
                    DirectiveNode::block("if", ["$prerender", "=", "1"], vec![]),
                ],
            )],
        );
        assert_eq!(rewrite_root_location(&mut server).unwrap(), Applied::Replaced(1));
        let root = &server.children()[0];
        assert_eq!(root.children().len(), 2);
        assert_eq!(root.children()[1].children().len(), 1);
    }

    #[test]
    fn test_root_rewrite_on_simple_location() {
        // `location /;` has no block; the patch turns it into one
        let mut server = DirectiveNode::section("server", vec![DirectiveNode::new("location", ["/"])]);
        rewrite_root_location(&mut server).unwrap();
        assert_eq!(server.children()[0].children().len(), 1);
    }

    #[test]
    fn test_root_rewrite_requires_root_location() {
        let mut server = DirectiveNode::section("server", vec![]);
        assert!(matches!(rewrite_root_location(&mut server), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_prerender_location_after_root() {
        let mut server = sample_server();
        let applied = add_prerender_location(&mut server, "tok123").unwrap();
        assert_eq!(applied, Applied::Inserted(4));

        let names: Vec<_> = server.children().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["listen", "server_name", "location", "location", "location", "error_page"]);
        let loc = &server.children()[4];
        assert_eq!(loc.args, vec![PRERENDER_LOCATION]);
        assert!(loc
            .children()
            .iter()
            .any(|d| d.matches("proxy_set_header", &["X-Prerender-Token", "tok123"])));
    }

    #[test]
    fn test_prerender_location_missing_token() {
        let mut server = sample_server();
        let before = server.clone();
        assert!(matches!(add_prerender_location(&mut server, ""), Err(Error::MissingToken)));
        assert!(matches!(add_prerender_location(&mut server, "   "), Err(Error::MissingToken)));
        assert_eq!(server, before);
    }

    #[test]
    fn test_prerender_location_token_verbatim() {
        let mut server = sample_server();
        let applied = add_prerender_location(&mut server, " tok ").unwrap();
        assert!(server.children()[applied.index()]
            .children()
            .iter()
            .any(|d| d.matches("proxy_set_header", &["X-Prerender-Token", " tok "])));
    }

    #[test]
    fn test_prerender_location_missing_anchor() {
        let mut server = DirectiveNode::section(
            "server",
            vec![
                DirectiveNode::new("listen", ["80"]),
                DirectiveNode::block("location", ["/api"], vec![]),
            ],
        );
        let before = server.clone();
        assert!(matches!(add_prerender_location(&mut server, "tok"), Err(Error::NotFound(_))));
        assert_eq!(server, before);
    }

    #[test]
    fn test_prerender_location_token_refresh() {
        let mut server = sample_server();
        add_prerender_location(&mut server, "old").unwrap();
        let applied = add_prerender_location(&mut server, "new").unwrap();
        assert_eq!(applied, Applied::Replaced(4));
        assert_eq!(server.children().len(), 6);
        assert!(server.children()[4]
            .children()
            .iter()
            .any(|d| d.matches("proxy_set_header", &["X-Prerender-Token", "new"])));
    }

    #[test]
    fn test_server_patches_idempotent_and_order_preserving() {
        let mut once = sample_server();
        rewrite_root_location(&mut once).unwrap();
        add_prerender_location(&mut once, "tok").unwrap();

        let mut twice = once.clone();
        rewrite_root_location(&mut twice).unwrap();
        add_prerender_location(&mut twice, "tok").unwrap();
        assert_eq!(once, twice);

        let untouched: Vec<_> = twice
            .children()
            .iter()
            .filter(|d| !d.matches("location", &[PRERENDER_LOCATION]))
            .map(|d| (d.name.clone(), d.args.clone()))
            .collect();
        let original: Vec<_> = sample_server()
            .children()
            .iter()
            .map(|d| (d.name.clone(), d.args.clone()))
            .collect();
        assert_eq!(untouched, original);
    }
}
