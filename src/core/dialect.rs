use log::warn;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{CsvError, CsvResult};

/// Encoding used when none (or an empty one) is configured.
pub const DEFAULT_ENCODING: &str = "CP1252";

/// Policy deciding when a field is wrapped in quote characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotingMode {
    /// Every field is quoted.
    All,
    /// Only fields containing the quote, the delimiter or a line break.
    #[default]
    Minimal,
    /// Every field that is not made of digits and dots only.
    NonNumeric,
}

impl QuotingMode {
    /// Parses a quoting mode label, falling back to `Minimal` for anything
    /// unknown.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "all" => QuotingMode::All,
            "minimal" => QuotingMode::Minimal,
            "nonnumeric" | "non_numeric" => QuotingMode::NonNumeric,
            other => {
                warn!("Unknown quoting mode {:?}, using minimal quoting", other);
                QuotingMode::Minimal
            }
        }
    }
}

/// Record terminator written by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LineEnding {
    #[serde(rename = "\n")]
    Lf,
    #[serde(rename = "\r")]
    Cr,
    #[default]
    #[serde(rename = "\r\n")]
    CrLf,
}

impl LineEnding {
    /// Normalizes a free-form label.
    ///
    /// `unix`, `linux` and `\n` give LF, `mac`, `macos` and `\r` give CR,
    /// anything else (including `windows` or an empty label) gives CRLF.
    pub fn from_label(label: &str) -> Self {
        match label {
            "\n" => return LineEnding::Lf,
            "\r" => return LineEnding::Cr,
            _ => {}
        }

        match label.trim().to_ascii_lowercase().as_str() {
            "unix" | "linux" => LineEnding::Lf,
            "mac" | "macos" => LineEnding::Cr,
            _ => LineEnding::CrLf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Cr => "\r",
            LineEnding::CrLf => "\r\n",
        }
    }

    /// Human label: `unix`, `mac` or `windows`.
    pub fn label(&self) -> &'static str {
        match self {
            LineEnding::Lf => "unix",
            LineEnding::Cr => "mac",
            LineEnding::CrLf => "windows",
        }
    }
}

/// What the transcoder does with characters it cannot convert exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslitPolicy {
    /// Best-effort substitution.
    #[default]
    #[serde(rename = "translit")]
    Transliterate,
    /// Silently drop the character.
    Ignore,
    /// Fail the conversion.
    Strict,
}

impl TranslitPolicy {
    /// `translit` and `ignore` are recognized, anything else is strict.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("translit") => TranslitPolicy::Transliterate,
            Some("ignore") => TranslitPolicy::Ignore,
            _ => TranslitPolicy::Strict,
        }
    }
}

fn as_char<S: Serializer>(byte: &u8, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str((*byte as char).encode_utf8(&mut [0; 4]))
}

/// Immutable description of a CSV flavour.
///
/// A dialect is built once, through [`DialectBuilder`], one of the presets or
/// an option map, and then handed to readers and writers.
///
/// # Examples
///
/// ```
/// use dialect_csv::core::dialect::{Dialect, LineEnding, QuotingMode};
///
/// let dialect = Dialect::builder()
///     .delimiter(b',')
///     .line_ending(LineEnding::Lf)
///     .encoding("UTF-8")
///     .quoting_mode(QuotingMode::NonNumeric)
///     .build();
///
/// assert_eq!(dialect.delimiter(), b',');
/// assert_eq!(dialect.quote(), b'"');
/// assert_eq!(dialect.encoding(), "UTF-8");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dialect {
    #[serde(serialize_with = "as_char")]
    delimiter: u8,
    #[serde(serialize_with = "as_char")]
    quote: u8,
    #[serde(serialize_with = "as_char")]
    escape: u8,
    escape_double: bool,
    quoting_mode: QuotingMode,
    line_ending: LineEnding,
    encoding: String,
    translit: TranslitPolicy,
    use_bom: bool,
    trim: bool,
    skip_empty_lines: bool,
    force_encoding_detection: bool,
    first_row_header: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::excel()
    }
}

impl Dialect {
    /// Excel flavour: `;` separated, CP1252, CRLF.
    pub fn excel() -> Self {
        Self {
            delimiter: b';',
            quote: b'"',
            escape: b'\\',
            escape_double: true,
            quoting_mode: QuotingMode::Minimal,
            line_ending: LineEnding::CrLf,
            encoding: DEFAULT_ENCODING.to_string(),
            translit: TranslitPolicy::Transliterate,
            use_bom: false,
            trim: false,
            skip_empty_lines: false,
            force_encoding_detection: false,
            first_row_header: false,
        }
    }

    /// Unix flavour: `,` separated, UTF-8, LF.
    pub fn unix() -> Self {
        Self {
            delimiter: b',',
            line_ending: LineEnding::Lf,
            encoding: "UTF-8".to_string(),
            ..Self::excel()
        }
    }

    /// Returns a named preset (`excel` or `unix`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "excel" => Some(Self::excel()),
            "unix" => Some(Self::unix()),
            _ => None,
        }
    }

    /// Starts a builder from the excel defaults.
    pub fn builder() -> DialectBuilder {
        DialectBuilder::new()
    }

    /// Starts a builder from this dialect's values.
    pub fn to_builder(&self) -> DialectBuilder {
        DialectBuilder::from_dialect(self.clone())
    }

    /// Builds a dialect from an option map.
    ///
    /// Keys are case-insensitive and unknown keys are ignored. Missing keys
    /// take the excel defaults. Accepted keys (aliases in parentheses):
    /// `delimiter`, `quote` (`enclosure`), `escape`, `escape_double`,
    /// `quoting_mode` (`enclosing_mode`), `line_ending` (`eol`), `encoding`,
    /// `translit`, `use_bom` (`bom`), `trim`, `skip_empty_lines`
    /// (`skip_empty`), `force_encoding_detection` (`force_encoding_detect`),
    /// `first_row_header`.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::InvalidArgument`] when a value has a type that
    /// cannot stand for the option, or a structural character is not a single
    /// ASCII character.
    ///
    /// # Examples
    ///
    /// ```
    /// use dialect_csv::core::dialect::{Dialect, LineEnding, QuotingMode};
    /// use serde_json::json;
    ///
    /// let options = json!({
    ///     "Delimiter": ",",
    ///     "EOL": "unix",
    ///     "enclosing_mode": "nonnumeric",
    ///     "encoding": "UTF-8",
    ///     "unknown": 42,
    /// });
    ///
    /// let dialect = Dialect::from_options(options.as_object().unwrap()).unwrap();
    /// assert_eq!(dialect.delimiter(), b',');
    /// assert_eq!(dialect.line_ending(), LineEnding::Lf);
    /// assert_eq!(dialect.quoting_mode(), QuotingMode::NonNumeric);
    /// ```
    pub fn from_options(options: &Map<String, Value>) -> CsvResult<Self> {
        let options: Map<String, Value> = options
            .iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value.clone()))
            .collect();

        let lookup = |names: &[&str]| names.iter().find_map(|name| options.get(*name));

        let mut builder = DialectBuilder::new();

        if let Some(value) = lookup(&["delimiter"]) {
            builder = builder.delimiter(option_byte("delimiter", value)?);
        }
        if let Some(value) = lookup(&["quote", "enclosure"]) {
            builder = builder.quote(option_byte("quote", value)?);
        }
        if let Some(value) = lookup(&["escape"]) {
            builder = builder.escape(option_byte("escape", value)?);
        }
        if let Some(value) = lookup(&["escape_double"]) {
            builder = builder.escape_double(option_flag("escape_double", value)?);
        }
        if let Some(value) = lookup(&["quoting_mode", "enclosing_mode"]) {
            let label = option_text("quoting_mode", value)?;
            builder = builder.quoting_mode(QuotingMode::from_label(&label));
        }
        if let Some(value) = lookup(&["line_ending", "eol"]) {
            let label = option_text("line_ending", value)?;
            builder = builder.line_ending(LineEnding::from_label(&label));
        }
        if let Some(value) = lookup(&["encoding"]) {
            builder = builder.encoding(option_text("encoding", value)?);
        }
        if let Some(value) = lookup(&["translit"]) {
            let label = match value {
                Value::Null => None,
                other => Some(option_text("translit", other)?),
            };
            builder = builder.translit(TranslitPolicy::from_label(label.as_deref()));
        }
        if let Some(value) = lookup(&["use_bom", "bom"]) {
            builder = builder.use_bom(option_flag("use_bom", value)?);
        }
        if let Some(value) = lookup(&["trim"]) {
            builder = builder.trim(option_flag("trim", value)?);
        }
        if let Some(value) = lookup(&["skip_empty_lines", "skip_empty"]) {
            builder = builder.skip_empty_lines(option_flag("skip_empty_lines", value)?);
        }
        if let Some(value) = lookup(&["force_encoding_detection", "force_encoding_detect"]) {
            builder = builder
                .force_encoding_detection(option_flag("force_encoding_detection", value)?);
        }
        if let Some(value) = lookup(&["first_row_header"]) {
            builder = builder.first_row_header(option_flag("first_row_header", value)?);
        }

        Ok(builder.build())
    }

    /// Exports the dialect as an option map accepted by [`Dialect::from_options`].
    pub fn to_options(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn quote(&self) -> u8 {
        self.quote
    }

    pub fn escape(&self) -> u8 {
        self.escape
    }

    pub fn escape_double(&self) -> bool {
        self.escape_double
    }

    pub fn quoting_mode(&self) -> QuotingMode {
        self.quoting_mode
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn translit(&self) -> TranslitPolicy {
        self.translit
    }

    pub fn use_bom(&self) -> bool {
        self.use_bom
    }

    pub fn trim(&self) -> bool {
        self.trim
    }

    pub fn skip_empty_lines(&self) -> bool {
        self.skip_empty_lines
    }

    pub fn force_encoding_detection(&self) -> bool {
        self.force_encoding_detection
    }

    pub fn first_row_header(&self) -> bool {
        self.first_row_header
    }
}

fn option_text(name: &str, value: &Value) -> CsvResult<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(CsvError::InvalidArgument(format!(
            "option {} expects a string, got {}",
            name, other
        ))),
    }
}

fn option_byte(name: &str, value: &Value) -> CsvResult<u8> {
    let text = option_text(name, value)?;
    let mut chars = text.chars();

    match (chars.next(), chars.next()) {
        (None, _) => Ok(0),
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(CsvError::InvalidArgument(format!(
            "option {} must be a single ASCII character, got {:?}",
            name, text
        ))),
    }
}

fn option_flag(name: &str, value: &Value) -> CsvResult<bool> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => Ok(number.as_f64().is_some_and(|n| n != 0.0)),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            _ => Err(CsvError::InvalidArgument(format!(
                "option {} expects a boolean, got {:?}",
                name, text
            ))),
        },
        other => Err(CsvError::InvalidArgument(format!(
            "option {} expects a boolean, got {}",
            name, other
        ))),
    }
}

/// A builder for [`Dialect`].
///
/// Starts from the excel preset, or from the dialect it was taken from with
/// [`Dialect::to_builder`]. Every setter normalizes its input so the built
/// dialect always holds usable values: a NUL or non-ASCII structural
/// character and an empty encoding fall back to the starting dialect's value.
///
/// # Examples
///
/// ```
/// use dialect_csv::core::dialect::{Dialect, DialectBuilder};
///
/// let dialect = DialectBuilder::new()
///     .delimiter(0)
///     .encoding("")
///     .build();
///
/// assert_eq!(dialect.delimiter(), b';');
/// assert_eq!(dialect.encoding(), "CP1252");
///
/// let unix = Dialect::unix().to_builder().delimiter(0).build();
/// assert_eq!(unix.delimiter(), b',');
/// ```
#[derive(Debug, Clone, Default)]
pub struct DialectBuilder {
    dialect: Dialect,
    defaults: Dialect,
}

/// Structural characters are single ASCII bytes. Anything else falls back.
fn structural(name: &str, byte: u8, fallback: u8) -> u8 {
    match byte {
        0 => fallback,
        byte if byte.is_ascii() => byte,
        byte => {
            warn!(
                "{} 0x{:02X} is not an ASCII character, using {:?}",
                name, byte, fallback as char
            );
            fallback
        }
    }
}

impl DialectBuilder {
    pub fn new() -> Self {
        Self::from_dialect(Dialect::excel())
    }

    fn from_dialect(dialect: Dialect) -> Self {
        Self {
            defaults: dialect.clone(),
            dialect,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.dialect.delimiter = structural("Delimiter", delimiter, self.defaults.delimiter);
        self
    }

    pub fn quote(mut self, quote: u8) -> Self {
        self.dialect.quote = structural("Quote", quote, self.defaults.quote);
        self
    }

    pub fn escape(mut self, escape: u8) -> Self {
        self.dialect.escape = structural("Escape", escape, self.defaults.escape);
        self
    }

    /// Escape quotes by doubling them (`true`) or by prefixing the escape
    /// character (`false`).
    pub fn escape_double(mut self, yes: bool) -> Self {
        self.dialect.escape_double = yes;
        self
    }

    pub fn quoting_mode(mut self, mode: QuotingMode) -> Self {
        self.dialect.quoting_mode = mode;
        self
    }

    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.dialect.line_ending = line_ending;
        self
    }

    pub fn encoding<S: Into<String>>(mut self, encoding: S) -> Self {
        let encoding = encoding.into();
        let encoding = encoding.trim();
        self.dialect.encoding = if encoding.is_empty() {
            self.defaults.encoding.clone()
        } else {
            encoding.to_string()
        };
        self
    }

    pub fn translit(mut self, policy: TranslitPolicy) -> Self {
        self.dialect.translit = policy;
        self
    }

    /// Strip a leading BOM on read, emit one on write.
    pub fn use_bom(mut self, yes: bool) -> Self {
        self.dialect.use_bom = yes;
        self
    }

    pub fn trim(mut self, yes: bool) -> Self {
        self.dialect.trim = yes;
        self
    }

    pub fn skip_empty_lines(mut self, yes: bool) -> Self {
        self.dialect.skip_empty_lines = yes;
        self
    }

    /// Ignore the configured encoding and detect it from the content.
    pub fn force_encoding_detection(mut self, yes: bool) -> Self {
        self.dialect.force_encoding_detection = yes;
        self
    }

    pub fn first_row_header(mut self, yes: bool) -> Self {
        self.dialect.first_row_header = yes;
        self
    }

    pub fn build(self) -> Dialect {
        self.dialect
    }
}
