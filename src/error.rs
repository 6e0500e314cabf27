use crate::token::{token_to_string, Span, Token};
use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use std::fmt;
use std::ops::Range;

#[derive(Debug)]
pub enum PluckError {
    Pitch(PitchError),
    Dsp(DspError),
    Expr(ExprError),
    Compile(CompileError),
    Song(SongError),
    Sink(SinkError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PitchError {
    InvalidNotation { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DspError {
    /// The excitation buffer would hold fewer than two samples.
    DegenerateBuffer { frequency: f64, sample_rate: u32 },
    /// A normalize step met a signal whose peak is zero.
    SilentBuffer,
    /// Compositing was asked to combine zero buffers.
    EmptyInput,
    InvalidDuration { duration: f64 },
    /// Damping outside the open interval (0, 1).
    InvalidDamping { damping: f64 },
    /// A buffer would exceed [`MAX_SAMPLES`](crate::dsp::compositor::MAX_SAMPLES).
    BufferTooLong { seconds: f64, sample_rate: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedChar { ch: char, pos: usize },
    InvalidNumber { text: String, pos: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedToken {
        expected: String,
        found: Token,
        span: Span,
    },
    UnexpectedEOF {
        expected: String,
        pos: usize,
    },
    /// Parentheses or unary signs nested past the parser's limit.
    TooDeep { span: Span },
    /// More tokens than an offset expression may hold.
    TooLong { span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    UnknownVariable { name: String, span: Span },
    DivisionByZero { span: Span },
    /// The operator at `span` produced an infinite or NaN result.
    Overflow { span: Span },
}

/// Any failure while turning a time-expression string into a number.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprError {
    Lex(LexError),
    Parse(ParseError),
    Eval(EvalError),
}

#[derive(Debug)]
pub enum CompileError {
    UnknownInstrumentTrack {
        name: String,
        available: Vec<String>,
    },
    StringCountMismatch {
        bar: usize,
        note: usize,
        expected: usize,
        found: usize,
    },
    InvalidSignature { text: String },
    Notation(PitchError),
    Dsp(DspError),
    Offset {
        bar: usize,
        note: usize,
        source: String,
        error: ExprError,
    },
    /// The stroke lands too far into the track to be rendered.
    StrokeOutOfRange { bar: usize, note: usize, seconds: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkError {
    RateMismatch { expected: u32, found: u32 },
}

#[derive(Debug)]
pub enum SongError {
    Json(serde_json::Error),
    Invalid { field: String, reason: String },
}

impl fmt::Display for PluckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluckError::Pitch(e) => write!(f, "Pitch error: {e}"),
            PluckError::Dsp(e) => write!(f, "DSP error: {e}"),
            PluckError::Expr(e) => write!(f, "Expression error: {e}"),
            PluckError::Compile(e) => write!(f, "Compile error: {e}"),
            PluckError::Song(e) => write!(f, "Song error: {e}"),
            PluckError::Sink(e) => write!(f, "Playback error: {e}"),
        }
    }
}

impl std::error::Error for PluckError {}

impl PluckError {
    /// Human-readable description; offset errors include an annotated snippet.
    pub fn report(&self) -> String {
        match self {
            PluckError::Compile(CompileError::Offset { source, error, .. }) => {
                format!("{self}\n{}", render_expr_report(source, error))
            }
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for PitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PitchError::InvalidNotation { text } => write!(f, "Invalid pitch notation '{text}'"),
        }
    }
}

impl std::error::Error for PitchError {}

impl fmt::Display for DspError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DspError::DegenerateBuffer { frequency, sample_rate } => write!(
                f,
                "Frequency {frequency} Hz is too high for sample rate {sample_rate} Hz"
            ),
            DspError::SilentBuffer => write!(f, "Cannot normalize a silent buffer"),
            DspError::EmptyInput => write!(f, "No buffers to overlay"),
            DspError::InvalidDuration { duration } => {
                write!(f, "Duration must be positive, got {duration} s")
            }
            DspError::InvalidDamping { damping } => {
                write!(f, "Damping must lie strictly between 0 and 1, got {damping}")
            }
            DspError::BufferTooLong { seconds, sample_rate } => write!(
                f,
                "{seconds} s at {sample_rate} Hz exceeds the limit of {} samples",
                crate::dsp::compositor::MAX_SAMPLES
            ),
        }
    }
}

impl std::error::Error for DspError {}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedChar { ch, pos } => write!(f, "Unexpected char '{ch}' at pos {pos}"),
            LexError::InvalidNumber { text, pos } => write!(f, "Invalid number '{text}' at pos {pos}"),
        }
    }
}

impl std::error::Error for LexError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { expected, found, span } => {
                write!(
                    f,
                    "Expected {expected}, found '{}' at pos {}",
                    token_to_string(found),
                    span.start
                )
            }
            ParseError::UnexpectedEOF { expected, .. } => {
                write!(f, "Unexpected end of expression, expected {expected}")
            }
            ParseError::TooDeep { span } => {
                write!(f, "Expression nested too deeply at pos {}", span.start)
            }
            ParseError::TooLong { span } => {
                write!(f, "Expression too long, stopped at pos {}", span.start)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnknownVariable { name, span } => {
                write!(f, "Unknown variable '{name}' at pos {}", span.start)
            }
            EvalError::DivisionByZero { span } => write!(f, "Division by zero at pos {}", span.start),
            EvalError::Overflow { span } => {
                write!(f, "Result out of range at pos {}", span.start)
            }
        }
    }
}

impl std::error::Error for EvalError {}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprError::Lex(e) => write!(f, "{e}"),
            ExprError::Parse(e) => write!(f, "{e}"),
            ExprError::Eval(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ExprError {}

impl ExprError {
    /// Byte range in the expression source that the error points at.
    pub fn span(&self) -> Range<usize> {
        match self {
            ExprError::Lex(LexError::UnexpectedChar { ch, pos }) => *pos..*pos + ch.len_utf8(),
            ExprError::Lex(LexError::InvalidNumber { text, pos }) => *pos..*pos + text.len(),
            ExprError::Parse(ParseError::UnexpectedToken { span, .. }) => span.start..span.end,
            ExprError::Parse(ParseError::UnexpectedEOF { pos, .. }) => *pos..*pos,
            ExprError::Parse(ParseError::TooDeep { span })
            | ExprError::Parse(ParseError::TooLong { span }) => span.start..span.end,
            ExprError::Eval(EvalError::UnknownVariable { span, .. })
            | ExprError::Eval(EvalError::DivisionByZero { span })
            | ExprError::Eval(EvalError::Overflow { span }) => span.start..span.end,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownInstrumentTrack { name, available } => write!(
                f,
                "Unknown track '{name}' (available: {})",
                available.join(", ")
            ),
            CompileError::StringCountMismatch { bar, note, expected, found } => write!(
                f,
                "Bar {bar}, note {note}: expected {expected} frets, found {found}"
            ),
            CompileError::InvalidSignature { text } => {
                write!(f, "Invalid time signature '{text}', expected N/M")
            }
            CompileError::Notation(e) => write!(f, "{e}"),
            CompileError::Dsp(e) => write!(f, "{e}"),
            CompileError::Offset { bar, note, source, error } => {
                write!(f, "Bar {bar}, note {note}: bad offset '{source}': {error}")
            }
            CompileError::StrokeOutOfRange { bar, note, seconds } => write!(
                f,
                "Bar {bar}, note {note}: stroke time {seconds} s is out of range"
            ),
        }
    }
}

impl std::error::Error for CompileError {}

impl fmt::Display for SongError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SongError::Json(e) => write!(f, "Malformed song document: {e}"),
            SongError::Invalid { field, reason } => write!(f, "Invalid field '{field}': {reason}"),
        }
    }
}

impl std::error::Error for SongError {}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::RateMismatch { expected, found } => write!(
                f,
                "Sink is running at {expected} Hz, cannot play audio at {found} Hz"
            ),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<LexError> for ExprError {
    fn from(e: LexError) -> Self {
        ExprError::Lex(e)
    }
}

impl From<ParseError> for ExprError {
    fn from(e: ParseError) -> Self {
        ExprError::Parse(e)
    }
}

impl From<EvalError> for ExprError {
    fn from(e: EvalError) -> Self {
        ExprError::Eval(e)
    }
}

impl From<PitchError> for CompileError {
    fn from(e: PitchError) -> Self {
        CompileError::Notation(e)
    }
}

impl From<DspError> for CompileError {
    fn from(e: DspError) -> Self {
        CompileError::Dsp(e)
    }
}

impl From<serde_json::Error> for SongError {
    fn from(e: serde_json::Error) -> Self {
        SongError::Json(e)
    }
}

impl From<PitchError> for PluckError {
    fn from(e: PitchError) -> Self {
        PluckError::Pitch(e)
    }
}

impl From<DspError> for PluckError {
    fn from(e: DspError) -> Self {
        PluckError::Dsp(e)
    }
}

impl From<ExprError> for PluckError {
    fn from(e: ExprError) -> Self {
        PluckError::Expr(e)
    }
}

impl From<CompileError> for PluckError {
    fn from(e: CompileError) -> Self {
        PluckError::Compile(e)
    }
}

impl From<SongError> for PluckError {
    fn from(e: SongError) -> Self {
        PluckError::Song(e)
    }
}

impl From<SinkError> for PluckError {
    fn from(e: SinkError) -> Self {
        PluckError::Sink(e)
    }
}

/// Render an expression error as an annotated snippet of its source text.
///
/// Output is uncoloured so it can go straight into logs or a JS string.
pub fn render_expr_report(source: &str, error: &ExprError) -> String {
    let span = error.span();
    let mut out = Vec::new();
    let written = Report::build(ReportKind::Error, span.clone())
        .with_config(
            Config::default()
                .with_color(false)
                .with_index_type(IndexType::Byte),
        )
        .with_message("invalid time expression")
        .with_label(Label::new(span).with_message(error.to_string()))
        .finish()
        .write(Source::from(source), &mut out);

    match written {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => format!("{error} in '{source}'"),
    }
}
