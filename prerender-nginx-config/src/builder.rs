//! Serialize directive trees back to nginx syntax
//!
//! Output uses 4-space indentation, one directive per line and `{`/`}` on
//! the directive's line and a line of their own. Arguments the lexer would
//! split or misread are double-quoted.

use prerender_nginx_core::DirectiveNode;

const INDENT: &str = "    ";

/// Render top-level directives as configuration text
pub fn build(directives: &[DirectiveNode]) -> String {
    let mut out = String::new();
    write_nodes(&mut out, directives, 0);
    out
}

fn write_nodes(out: &mut String, nodes: &[DirectiveNode], depth: usize) {
    for node in nodes {
        let indent = INDENT.repeat(depth);
        out.push_str(&indent);

        if node.is_comment() {
            out.push('#');
            out.push_str(node.first_arg().unwrap_or_default());
            out.push('\n');
            continue;
        }

        out.push_str(&render_arg(&node.name));
        if node.name == "if" && !node.args.is_empty() {
            let condition: Vec<String> = node.args.iter().map(|a| render_arg(a)).collect();
            out.push_str(" (");
            out.push_str(&condition.join(" "));
            out.push(')');
        } else {
            for arg in &node.args {
                out.push(' ');
                out.push_str(&render_arg(arg));
            }
        }

        match &node.children {
            None => out.push_str(";\n"),
            Some(children) => {
                out.push_str(" {\n");
                write_nodes(out, children, depth + 1);
                out.push_str(&indent);
                out.push_str("}\n");
            }
        }
    }
}

fn needs_quotes(arg: &str) -> bool {
    if arg.is_empty() || arg.starts_with('#') {
        return true;
    }
    let mut chars = arg.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => return true,
            '{' | '}' | ';' | '"' | '\'' => return true,
            // Keep `\x` pairs intact, a trailing backslash has nothing to escape
            '\\' if chars.next().is_none() => return true,
            _ => {}
        }
    }
    false
}

/// Double-quote when needed, escaping `\` and `"` the way the lexer
/// unescapes them
fn render_arg(arg: &str) -> String {
    if !needs_quotes(arg) {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_nested() {
        let tree = vec![DirectiveNode::section(
            "server",
            vec![
                DirectiveNode::new("listen", ["80"]),
                DirectiveNode::block("location", ["/"], vec![]),
            ],
        )];
        assert_eq!(
            build(&tree),
            "server {\n    listen 80;\n    location / {\n    }\n}\n"
        );
    }

    #[test]
    fn test_build_if_and_comment() {
        let tree = vec![
            DirectiveNode::new("#", [" managed"]),
            DirectiveNode::block(
                "if",
                ["$prerender", "=", "1"],
                vec![DirectiveNode::new("rewrite", ["(.*)", "/prerenderio", "last"])],
            ),
        ];
        assert_eq!(
            build(&tree),
            "# managed\nif ($prerender = 1) {\n    rewrite (.*) /prerenderio last;\n}\n"
        );
    }

    #[test]
    fn test_quoting() {
        assert_eq!(render_arg("$uri"), "$uri");
        assert_eq!(render_arg(r"~*yahoo!\ slurp"), r"~*yahoo!\ slurp");
        assert_eq!(render_arg("a b"), "\"a b\"");
        assert_eq!(render_arg(""), "\"\"");
        assert_eq!(render_arg("x{2}"), "\"x{2}\"");
        assert_eq!(render_arg("say \"hi\""), r#""say \"hi\"""#);
        assert_eq!(render_arg("#frag"), "\"#frag\"");
        assert_eq!(render_arg(r#"a \"b"#), r#""a \\\"b""#);
        assert_eq!(render_arg(r"dir\"), r#""dir\\""#);
    }
}
