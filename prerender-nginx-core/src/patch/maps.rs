//! The `map` family that decides whether a request goes to Prerender
//!
//! ```text
//! $http_user_agent -> $prerender_ua
//! $args            -> $prerender_args   (default $prerender_ua)
//! $http_x_prerender-> $x_prerender      (default $prerender_args)
//! $uri             -> $prerender        (default $x_prerender)
//! ```
//!
//! Each map feeds the next one, so they are kept together and in this order.

use super::{upsert, Applied};
use crate::tree::DirectiveNode;

/// Crawler user agents answered with prerendered pages
pub const BOT_USER_AGENTS: &[&str] = &[
    r"~*googlebot",
    r"~*yahoo!\ slurp",
    r"~*bingbot",
    r"~*yandex",
    r"~*baiduspider",
    r"~*facebookexternalhit",
    r"~*twitterbot",
    r"~*rogerbot",
    r"~*linkedinbot",
    r"~*embedly",
    r"~*quora\ link\ preview",
    r"~*showyoubot",
    r"~*outbrain",
    r"~*pinterest\/0\.",
    r"~*developers.google.com\/\+\/web\/snippet",
    r"~*slackbot",
    r"~*vkshare",
    r"~*w3c_validator",
    r"~*redditbot",
    r"~*applebot",
    r"~*whatsapp",
    r"~*flipboard",
    r"~*tumblr",
    r"~*bitlybot",
    r"~*skypeuripreview",
    r"~*nuzzel",
    r"~*discordbot",
    r"~*google\ page\ speed",
    r"~*qwantify",
    r"~*pinterestbot",
    r"~*bitrix\ link\ preview",
    r"~*xing-contenttabreceiver",
    r"~*chrome-lighthouse",
    r"~*telegrambot",
    r"~*google-inspectiontool",
    r"~*petalbot",
];

/// Static asset extensions never sent to Prerender
pub const STATIC_EXTENSIONS: &str = "js|css|xml|less|png|jpg|jpeg|gif|pdf|txt|ico|rss|zip|mp3|rar|exe|wmv|doc|avi|ppt|mpg|mpeg|tif|wav|mov|psd|ai|xls|mp4|m4a|swf|dat|dmg|iso|flv|m4v|torrent|ttf|woff|woff2|svg|eot";

fn entry(pattern: &str, value: &str) -> DirectiveNode {
    DirectiveNode::new(pattern, [value])
}

fn map(input: &str, output: &str, entries: Vec<DirectiveNode>) -> DirectiveNode {
    DirectiveNode::block("map", [input, output], entries)
}

/// The four maps in dependency order
pub fn prerender_maps() -> [DirectiveNode; 4] {
    let mut user_agents = vec![entry("default", "0"), entry("~*Prerender", "0")];
    user_agents.extend(BOT_USER_AGENTS.iter().map(|ua| entry(ua, "1")));

    [
        map("$http_user_agent", "$prerender_ua", user_agents),
        map(
            "$args",
            "$prerender_args",
            vec![
                entry("default", "$prerender_ua"),
                entry("~(^|&)_escaped_fragment_=", "1"),
            ],
        ),
        map(
            "$http_x_prerender",
            "$x_prerender",
            vec![entry("default", "$prerender_args"), entry("1", "0")],
        ),
        map(
            "$uri",
            "$prerender",
            vec![
                entry("default", "$x_prerender"),
                entry(&format!(r"~*\.({})", STATIC_EXTENSIONS), "0"),
            ],
        ),
    ]
}

/// Add or refresh the prerender maps in an `http` scope
///
/// Existing maps keep their position and get a fresh body. Missing maps go
/// right after the last map handled so far, or to the top of the scope when
/// none exist yet.
pub fn add_map_section(scope: &mut Vec<DirectiveNode>) -> Vec<Applied> {
    let mut insert_at = 0;
    prerender_maps()
        .into_iter()
        .map(|node| {
            let applied = upsert(scope, node, insert_at);
            insert_at = applied.index() + 1;
            applied
        })
        .collect()
}
