//! Deterministic mapping from wall-clock milliseconds to accounting windows.

// self
use crate::_prelude::*;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Width of an accounting window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Granularity {
	/// One-minute windows.
	Minute,
	/// One-hour windows.
	Hour,
	/// UTC calendar-day windows.
	#[default]
	Day,
}
impl Granularity {
	/// Window width in milliseconds.
	pub const fn span_ms(self) -> i64 {
		match self {
			Granularity::Minute => MINUTE_MS,
			Granularity::Hour => HOUR_MS,
			Granularity::Day => DAY_MS,
		}
	}

	/// Returns a stable label used in window keys and configuration.
	pub const fn as_str(self) -> &'static str {
		match self {
			Granularity::Minute => "minute",
			Granularity::Hour => "hour",
			Granularity::Day => "day",
		}
	}
}
impl Display for Granularity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Granularity {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"minute" => Ok(Self::Minute),
			"hour" => Ok(Self::Hour),
			"day" => Ok(Self::Day),
			other => Err(ConfigError::UnknownGranularity { value: other.to_owned() }),
		}
	}
}
impl TryFrom<String> for Granularity {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<Granularity> for String {
	fn from(value: Granularity) -> Self {
		value.as_str().to_owned()
	}
}

/// Half-open interval `[start_ms, end_ms)` against which consumption is aggregated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
	/// Inclusive start, in Unix milliseconds.
	pub start_ms: i64,
	/// Exclusive end, in Unix milliseconds.
	pub end_ms: i64,
}
impl TimeWindow {
	/// Returns `true` if `timestamp_ms` falls inside the window.
	pub fn contains(&self, timestamp_ms: i64) -> bool {
		self.start_ms <= timestamp_ms && timestamp_ms < self.end_ms
	}

	/// Returns `true` once the window lies entirely before `now_ms`.
	pub fn has_elapsed_at(&self, now_ms: i64) -> bool {
		self.end_ms <= now_ms
	}
}

/// Identifies one accounting window; rendered as `<granularity>:<start_ms>`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WindowKey {
	granularity: Granularity,
	start_ms: i64,
}
impl WindowKey {
	/// Granularity the key was derived with.
	pub fn granularity(&self) -> Granularity {
		self.granularity
	}

	/// Inclusive start of the window.
	pub fn start_ms(&self) -> i64 {
		self.start_ms
	}

	/// Expands the key into its interval.
	pub fn window(&self) -> TimeWindow {
		TimeWindow {
			start_ms: self.start_ms,
			end_ms: self.start_ms.saturating_add(self.granularity.span_ms()),
		}
	}
}
impl Debug for WindowKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "WindowKey({self})")
	}
}
impl Display for WindowKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}:{}", self.granularity, self.start_ms)
	}
}
impl FromStr for WindowKey {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = || ConfigError::InvalidValue {
			field: "window_key",
			reason: format!("`{s}` is not `<granularity>:<start_ms>`"),
		};
		let (label, start) = s.split_once(':').ok_or_else(invalid)?;
		let granularity = label.parse::<Granularity>()?;
		let start_ms = start.parse::<i64>().map_err(|_| invalid())?;

		if start_ms.rem_euclid(granularity.span_ms()) != 0 {
			return Err(invalid());
		}

		Ok(Self { granularity, start_ms })
	}
}
impl TryFrom<String> for WindowKey {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<WindowKey> for String {
	fn from(value: WindowKey) -> Self {
		value.to_string()
	}
}

/// Maps a timestamp to the window that contains it.
///
/// Pure and total: timestamps before the Unix epoch floor toward negative infinity so every
/// instant lands in exactly one window.
pub fn window_for(timestamp_ms: i64, granularity: Granularity) -> WindowKey {
	let span = granularity.span_ms();

	WindowKey { granularity, start_ms: timestamp_ms.div_euclid(span).saturating_mul(span) }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
	let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;

	i64::try_from(nanos).unwrap_or(i64::MAX)
}

/// Converts Unix milliseconds into a UTC datetime, clamping at the representable range.
pub fn datetime_from_ms(timestamp_ms: i64) -> OffsetDateTime {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000).unwrap_or_else(
		|_| {
			if timestamp_ms < 0 {
				time::PrimitiveDateTime::MIN.assume_utc()
			} else {
				time::PrimitiveDateTime::MAX.assume_utc()
			}
		},
	)
}
