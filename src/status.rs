//! Interpretation of the 14 field `DAT` status line.

use core::time::Duration;

/// Number of fields in a well-formed status line.
pub const STATUS_FIELD_COUNT: usize = 14;

/// Human readable meaning of each status field position.
pub const FIELD_LABELS: [&str; STATUS_FIELD_COUNT] = [
    "Software version",
    "Leybold internal use only",
    "COOLPAK hours counter",
    "Leybold internal use only",
    "Leybold internal use only",
    "Leybold internal use only",
    "Switch-ON delay timer [seconds]",
    "Command status (0==OFF, 1==ON, 2==SYSTEM ERROR)",
    "Actual compressor status (0==OFF, 1==ON)",
    "Not used",
    "Not used",
    "Number of still active errors",
    "Error bit map (1==error active, 0==error not active)",
    "Number of recorded and logged errors",
];

/// Status field positions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(usize)]
pub enum StatusField {
    SoftwareVersion = 0,
    /// __Reserved__ - Leybold internal use.
    Internal1 = 1,
    HoursCounter = 2,
    /// __Reserved__ - Leybold internal use.
    Internal3 = 3,
    /// __Reserved__ - Leybold internal use.
    Internal4 = 4,
    /// __Reserved__ - Leybold internal use.
    Internal5 = 5,
    /// Seconds remaining before the compressor may be switched on again.
    SwitchOnDelay = 6,
    /// See [`CommandedPower`].
    CommandedPower = 7,
    /// See [`ActualPower`].
    ActualPower = 8,
    /// __Reserved__ - not used.
    Unused9 = 9,
    /// __Reserved__ - not used.
    Unused10 = 10,
    ActiveErrorCount = 11,
    /// One character per error, `1` meaning active.
    ErrorBitmap = 12,
    LoggedErrorCount = 13,
}

impl StatusField {
    pub fn label(self) -> &'static str {
        FIELD_LABELS[self as usize]
    }
}

/// Label for a field position, `None` past the end of the schema.
pub fn field_label(index: usize) -> Option<&'static str> {
    FIELD_LABELS.get(index).copied()
}

/// A validated status line: exactly 14 raw string fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFields([String; STATUS_FIELD_COUNT]);

impl StatusFields {
    pub fn get(&self, field: StatusField) -> &str {
        &self.0[field as usize]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Pair every field with its label.
    pub fn labelled(&self) -> impl Iterator<Item = (&'static str, &str)> {
        FIELD_LABELS
            .iter()
            .copied()
            .zip(self.0.iter().map(String::as_str))
    }
}

impl TryFrom<Vec<String>> for StatusFields {
    type Error = Vec<String>;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        <[String; STATUS_FIELD_COUNT]>::try_from(fields).map(StatusFields)
    }
}

/// Power state the controller has been commanded into (field 7).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandedPower {
    Off,
    On,
    SystemError,
    /// Any token other than `0`, `1` or `2`.
    Unknown,
}

impl From<&str> for CommandedPower {
    fn from(token: &str) -> Self {
        match token {
            "0" => CommandedPower::Off,
            "1" => CommandedPower::On,
            "2" => CommandedPower::SystemError,
            _ => CommandedPower::Unknown,
        }
    }
}

/// Power state the compressor is actually in (field 8).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ActualPower {
    Off,
    On,
    /// Any token other than `0` or `1`.
    Unknown,
}

impl From<&str> for ActualPower {
    fn from(token: &str) -> Self {
        match token {
            "0" => ActualPower::Off,
            "1" => ActualPower::On,
            _ => ActualPower::Unknown,
        }
    }
}

/// Named view of a status line.
///
/// Counters are kept as the device sent them; the typed accessors parse them on
/// demand and return `None` for anything that is not a plain decimal number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub software_version: String,
    pub hours_counter: String,
    pub switch_on_delay_seconds: String,
    pub commanded_power: CommandedPower,
    pub actual_power: ActualPower,
    pub active_error_count: String,
    pub error_bitmap: String,
    pub logged_error_count: String,
    fields: StatusFields,
}

impl DeviceStatus {
    /// Interpret a validated status line.
    pub fn interpret(fields: StatusFields) -> Self {
        Self {
            software_version: fields.get(StatusField::SoftwareVersion).to_owned(),
            hours_counter: fields.get(StatusField::HoursCounter).to_owned(),
            switch_on_delay_seconds: fields.get(StatusField::SwitchOnDelay).to_owned(),
            commanded_power: CommandedPower::from(fields.get(StatusField::CommandedPower)),
            actual_power: ActualPower::from(fields.get(StatusField::ActualPower)),
            active_error_count: fields.get(StatusField::ActiveErrorCount).to_owned(),
            error_bitmap: fields.get(StatusField::ErrorBitmap).to_owned(),
            logged_error_count: fields.get(StatusField::LoggedErrorCount).to_owned(),
            fields,
        }
    }

    /// The full line this status was interpreted from, reserved fields included.
    pub fn raw(&self) -> &StatusFields {
        &self.fields
    }

    /// Raw `0`/`1` token of the actual power field.
    pub fn actual_power_token(&self) -> &str {
        self.fields.get(StatusField::ActualPower)
    }

    pub fn hours(&self) -> Option<u32> {
        self.hours_counter.trim().parse().ok()
    }

    pub fn switch_on_delay(&self) -> Option<Duration> {
        self.switch_on_delay_seconds
            .trim()
            .parse()
            .ok()
            .map(Duration::from_secs)
    }

    pub fn active_errors(&self) -> Option<u32> {
        self.active_error_count.trim().parse().ok()
    }

    pub fn logged_errors(&self) -> Option<u32> {
        self.logged_error_count.trim().parse().ok()
    }

    /// Zero-based positions of the `1` characters in the error bit map.
    pub fn active_error_bits(&self) -> impl Iterator<Item = usize> + '_ {
        self.error_bitmap
            .chars()
            .enumerate()
            .filter(|(_, bit)| *bit == '1')
            .map(|(position, _)| position)
    }
}
