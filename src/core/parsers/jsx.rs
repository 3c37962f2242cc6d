use std::path::Path;

use anyhow::{Result, anyhow};
use swc_common::{
    BytePos, FileName, GLOBALS, Globals, SourceMap, Span as SwcSpan, Spanned, sync::Lrc,
};
use swc_ecma_ast::Module;
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, TsSyntax};

use crate::core::source::Span;

const BOM: char = '\u{FEFF}';

/// A parsed module plus the offsets needed to map swc positions back to
/// byte offsets into the file content.
#[derive(Debug)]
pub struct ParsedModule {
    pub module: Module,
    start_pos: BytePos,
    /// Bytes of the file content that precede the parsed text (a BOM).
    content_start: usize,
}

impl ParsedModule {
    /// Convert an swc span into a byte span relative to the file content.
    pub fn span(&self, span: SwcSpan) -> Span {
        Span::new(self.offset(span.lo), self.offset(span.hi))
    }

    /// First byte of the content that belongs to the program. Nonzero only
    /// for files starting with a byte order mark.
    pub fn content_start(&self) -> usize {
        self.content_start
    }

    fn offset(&self, pos: BytePos) -> usize {
        pos.0.saturating_sub(self.start_pos.0) as usize + self.content_start
    }
}

/// Pick the parser syntax from the file extension. `.ts` files are parsed
/// without JSX so angle-bracket type assertions keep working.
pub fn syntax_for(path: &Path) -> Syntax {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ts") => Syntax::Typescript(TsSyntax {
            tsx: false,
            ..Default::default()
        }),
        Some("js" | "jsx") => Syntax::Es(EsSyntax {
            jsx: true,
            ..Default::default()
        }),
        _ => Syntax::Typescript(TsSyntax {
            tsx: true,
            ..Default::default()
        }),
    }
}

/// Parse JSX/TSX source code into an AST.
///
/// Recoverable parser errors are treated as failures: a file the parser had
/// to guess about is not safe to rewrite.
///
/// A leading byte order mark is not handed to the parser; spans are shifted
/// back so they stay relative to `code`.
pub fn parse_jsx_source(code: &str, path: &Path) -> Result<ParsedModule> {
    let (content_start, program) = match code.strip_prefix(BOM) {
        Some(rest) => (BOM.len_utf8(), rest),
        None => (0, code),
    };

    GLOBALS.set(&Globals::new(), || {
        let source_map: Lrc<SourceMap> = Default::default();
        let source_file =
            source_map.new_source_file(FileName::Real(path.into()).into(), program.to_string());

        let mut parser = Parser::new(syntax_for(path), StringInput::from(&*source_file), None);

        let module = parser
            .parse_module()
            .map_err(|e| anyhow!("{}", describe(program, &e, source_file.start_pos)))?;

        if let Some(err) = parser.take_errors().into_iter().next() {
            return Err(anyhow!("{}", describe(program, &err, source_file.start_pos)));
        }

        Ok(ParsedModule {
            module,
            start_pos: source_file.start_pos,
            content_start,
        })
    })
}

fn describe(code: &str, err: &swc_ecma_parser::error::Error, start_pos: BytePos) -> String {
    let offset = (err.span().lo.0.saturating_sub(start_pos.0) as usize).min(code.len());
    let line = code.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1;
    format!("line {}: {}", line, err.kind().msg())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsx() {
        let code = "export const App = () => <div title=\"x\">Hello</div>;";
        let parsed = parse_jsx_source(code, Path::new("app.tsx")).unwrap();
        assert_eq!(parsed.module.body.len(), 1);
    }

    #[test]
    fn test_span_is_relative_to_content() {
        let code = "const a = 1;\nconst b = 2;";
        let parsed = parse_jsx_source(code, Path::new("a.ts")).unwrap();
        let second = parsed.span(parsed.module.body[1].span());
        assert_eq!(&code[second.lo..second.hi], "const b = 2;");
    }

    #[test]
    fn test_span_skips_byte_order_mark() {
        let code = "\u{FEFF}const a = 'é';\nconst b = 2;";
        let parsed = parse_jsx_source(code, Path::new("a.ts")).unwrap();
        assert_eq!(parsed.content_start(), 3);
        let first = parsed.span(parsed.module.body[0].span());
        let second = parsed.span(parsed.module.body[1].span());
        assert_eq!(&code[first.lo..first.hi], "const a = 'é';");
        assert_eq!(&code[second.lo..second.hi], "const b = 2;");
    }

    #[test]
    fn test_crlf_spans_are_byte_offsets() {
        let code = "const a = 1;\r\nconst b = 2;\r\n";
        let parsed = parse_jsx_source(code, Path::new("a.ts")).unwrap();
        let second = parsed.span(parsed.module.body[1].span());
        assert_eq!(&code[second.lo..second.hi], "const b = 2;");
    }

    #[test]
    fn test_parse_failure_reports_line() {
        let code = "const a = 1;\nconst = ;";
        let err = parse_jsx_source(code, Path::new("a.tsx")).unwrap_err();
        assert!(err.to_string().starts_with("line 2"), "{}", err);
    }

    #[test]
    fn test_ts_allows_angle_bracket_assertion() {
        let code = "const n = <number>value;";
        assert!(parse_jsx_source(code, Path::new("a.ts")).is_ok());
        assert!(parse_jsx_source(code, Path::new("a.tsx")).is_err());
    }

    #[test]
    fn test_jsx_in_js_file() {
        let code = "export default function App() { return <p>Hi</p>; }";
        assert!(parse_jsx_source(code, Path::new("app.jsx")).is_ok());
        assert!(parse_jsx_source(code, Path::new("app.js")).is_ok());
    }
}
