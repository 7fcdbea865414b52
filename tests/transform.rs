use codepress_logsite::{transform, Rewriter, SourcePlugin, TransformConfig};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const PAGE: &str = r#"'use client';

import { useLogger, withLogger } from '@codepress/logger';

export function Page({ items }: Props) {
  const log = useLogger();
  // logger.info("not a call")
  const label = "logger.warn(nope)";

  const onClick = () => {
    log.info(`clicked ${items.length}`);
    logger.error('failed', { items, label });
  };

  return <button onClick={onClick}>Don't click</button>;
}

export default withLogger(Page);
"#;

const EXPECTED: &str = r#"'use client';

import { useLogger, withLogger } from '@codepress/logger';

export function Page({ items }: Props) {
  const log = useLogger({ __source: { fileName: "src/app/page", lineNumber: 6 } });
  // logger.info("not a call")
  const label = "logger.warn(nope)";

  const onClick = () => {
    log.info(`clicked ${items.length}`, undefined, { __source: { fileName: "src/app/page", lineNumber: 11 } });
    logger.error('failed', { items, label }, { __source: { fileName: "src/app/page", lineNumber: 12 } });
  };

  return <button onClick={onClick}>Don't click</button>;
}

export default withLogger(Page, { __source: { fileName: "src/app/page", lineNumber: 18 } });
"#;

#[test]
fn annotates_a_component_module() {
    init_logging();
    let out = transform(PAGE, "/Users/dev/shop/src/app/page.tsx");
    assert!(out.changed);
    assert_eq!(out.text, EXPECTED);
}

#[test]
fn worked_examples() {
    init_logging();
    let src = "\n\n\n\nuseLogger()";
    assert_eq!(
        transform(src, "app/page.tsx").text,
        "\n\n\n\nuseLogger({ __source: { fileName: \"app/page\", lineNumber: 5 } })"
    );
    assert_eq!(
        transform(r#"logger.info("hi")"#, "app/page.tsx").text,
        r#"logger.info("hi", undefined, { __source: { fileName: "app/page", lineNumber: 1 } })"#
    );
}

#[test]
fn output_is_deterministic() {
    init_logging();
    let a = transform(PAGE, "src/app/page.tsx");
    let b = transform(PAGE, "src/app/page.tsx");
    assert_eq!(a, b);
}

#[test]
fn second_pass_splices_again() {
    init_logging();
    let once = transform("useLogger()", "app/page.tsx").text;
    let twice = transform(&once, "app/page.tsx").text;
    assert_eq!(
        twice,
        r#"useLogger({ __source: { fileName: "app/page", lineNumber: 1 }, __source: { fileName: "app/page", lineNumber: 1 } })"#
    );
}

#[test]
fn unchanged_files_are_returned_verbatim() {
    init_logging();
    let src = "export const add = (a: number, b: number) => a + b;\n";
    let out = transform(src, "src/math.ts");
    assert!(!out.changed);
    assert_eq!(out.text, src);
}

#[test]
fn configured_names_replace_defaults() {
    init_logging();
    let config = TransformConfig::from_json(
        r#"{ "monitored": { "hooks": ["useTrace"], "wrappers": [], "receivers": ["tracer"], "methods": ["span"] } }"#,
    )
    .unwrap();
    let rewriter = Rewriter::new(config).unwrap();
    let out = rewriter.transform("useTrace(); tracer.span('a', b); logger.info('x')", "lib/t.ts");
    assert_eq!(
        out.text,
        r#"useTrace({ __source: { fileName: "lib/t", lineNumber: 1 } }); tracer.span('a', b, { __source: { fileName: "lib/t", lineNumber: 1 } }); logger.info('x')"#
    );
}

#[test]
fn bundler_entry_point() {
    init_logging();
    let plugin = SourcePlugin::from_plugin_config(None);
    let out = plugin
        .transform_module("withLogger(Nav)", "webpack-internal:///(app-pages-browser)/./components/Nav.jsx")
        .unwrap();
    assert_eq!(
        out.text,
        r#"withLogger(Nav, { __source: { fileName: "components/Nav", lineNumber: 1 } })"#
    );
    assert!(plugin.transform_module("withLogger(Nav)", "/app/node_modules/ui/Nav.js").is_none());
}
