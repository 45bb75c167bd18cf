//! Raw SQL fragments: the explicit escape hatch from parameterization.
//!
//! A [`RawExpr`] is inserted into the statement verbatim, so anything it
//! carries must come from trusted code. Use it for server-side functions
//! (`NOW()`, `ABS(?)`, sub-selects) that cannot be expressed as a bound value.

use crate::compile::Params;
use crate::error::CompileError;
use crate::value::Value;

/// Marker that string-typed entry points (`select("`NOW()")`, JSON payloads)
/// accept in place of an explicit [`raw`] call.
pub const RAW_MARKER: char = '`';

/// How the `?` markers of a raw template are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Each `?` becomes the literal text of its argument.
    Inline,
    /// Each `?` becomes a dialect placeholder and its argument is bound.
    Bind,
}

/// A caller-trusted SQL fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExpr {
    template: String,
    args: Vec<Value>,
    mode: Interpolation,
}

/// Create a raw fragment with no arguments.
///
/// **Warning**: the text is not escaped or validated.
pub fn raw(sql: impl Into<String>) -> RawExpr {
    RawExpr::new(sql)
}

/// Create a raw fragment whose `?` markers are replaced by the literal text of `args`.
///
/// **Warning**: arguments are interpolated without quoting.
pub fn raw_with<V: Into<Value>>(sql: impl Into<String>, args: impl IntoIterator<Item = V>) -> RawExpr {
    RawExpr::new(sql).inline(args)
}

/// Create a raw fragment whose `?` markers become bound parameters.
pub fn raw_bind<V: Into<Value>>(sql: impl Into<String>, args: impl IntoIterator<Item = V>) -> RawExpr {
    RawExpr::new(sql).bind(args)
}

impl RawExpr {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            template: sql.into(),
            args: Vec::new(),
            mode: Interpolation::Inline,
        }
    }

    /// Interpolate `args` literally.
    pub fn inline<V: Into<Value>>(mut self, args: impl IntoIterator<Item = V>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self.mode = Interpolation::Inline;
        self
    }

    /// Bind `args` as parameters.
    pub fn bind<V: Into<Value>>(mut self, args: impl IntoIterator<Item = V>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self.mode = Interpolation::Bind;
        self
    }

    /// Recognise the backtick-marked form: `` "`NOW()" `` → `raw("NOW()")`.
    pub fn parse_marked(s: &str) -> Option<Self> {
        s.strip_prefix(RAW_MARKER).map(RawExpr::new)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn mode(&self) -> Interpolation {
        self.mode
    }

    /// Number of `?` markers in the template.
    pub fn markers(&self) -> usize {
        self.template.matches('?').count()
    }

    /// Render the fragment, pushing bound arguments into `params`.
    ///
    /// Markers without a matching argument are kept verbatim.
    pub(crate) fn render(&self, params: &mut Params) -> Result<String, CompileError> {
        let markers = self.markers();
        if self.args.len() > markers {
            return Err(CompileError::RawArity {
                template: self.template.clone(),
                markers,
                args: self.args.len(),
            });
        }

        let mut out = String::with_capacity(self.template.len());
        let mut args = self.args.iter();
        let mut pieces = self.template.split('?').peekable();
        while let Some(piece) = pieces.next() {
            out.push_str(piece);
            if pieces.peek().is_none() {
                break;
            }
            match (args.next(), self.mode) {
                (Some(arg), Interpolation::Inline) => out.push_str(&arg.to_string()),
                (Some(arg), Interpolation::Bind) => out.push_str(&params.push(arg.clone())),
                (None, _) => out.push('?'),
            }
        }
        Ok(out)
    }
}
