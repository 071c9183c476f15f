use crate::error::{Result, ToolError};

/// A single point record with the attributes the algorithms in this workspace consume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub intensity: u16,
    pub classification: u8,
    pub return_number: u8,
    pub number_of_returns: u8,
    pub scan_angle: f64,
    pub gps_time: f64,
    /// Flagged points are skipped by every consumer
    pub withheld: bool,
}

impl Default for PointRecord {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            intensity: 0,
            classification: 0,
            return_number: 1,
            number_of_returns: 1,
            scan_angle: 0.0,
            gps_time: 0.0,
            withheld: false,
        }
    }
}

/// Random access to the point records of a cloud. The record count is known up front so
/// consumers can preallocate and report progress.
pub trait PointSource: Sync {
    /// Number of records in the source
    fn len(&self) -> usize;
    /// Returns true if the source holds no records
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// The record at the given index
    fn record(&self, index: usize) -> PointRecord;
    /// The packed color of the record at the given index, if the source carries color
    fn color(&self, index: usize) -> Option<u32> {
        let _ = index;
        None
    }
}

/// Which returns of a multi-return pulse to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnSelection {
    /// Keep every return
    All,
    /// Keep only first returns
    FirstOnly,
    /// Keep only last returns
    LastOnly,
}

impl ReturnSelection {
    fn accepts(&self, record: &PointRecord) -> bool {
        match self {
            ReturnSelection::All => true,
            ReturnSelection::FirstOnly => record.return_number == 1,
            ReturnSelection::LastOnly => record.return_number == record.number_of_returns,
        }
    }
}

/// Table of excluded classification codes. Codes run from 0 to 31.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassExclusions {
    excluded: [bool; 32],
}

impl ClassExclusions {
    /// Creates a table with no class excluded
    pub fn none() -> Self {
        Self {
            excluded: [false; 32],
        }
    }

    /// Marks the given classification code as excluded. Returns an error for codes beyond 31.
    /// ```
    /// # use terrane_core::cloud::ClassExclusions;
    /// let mut exclusions = ClassExclusions::none();
    /// exclusions.exclude(7).unwrap();
    /// assert!(exclusions.is_excluded(7));
    /// assert!(exclusions.exclude(32).is_err());
    /// ```
    pub fn exclude(&mut self, class: u8) -> Result<()> {
        if class >= 32 {
            return Err(ToolError::InvalidInput(format!(
                "classification code {} is out of range (0..=31)",
                class
            )));
        }
        self.excluded[class as usize] = true;
        Ok(())
    }

    /// Returns true if the given classification code is excluded. Codes beyond 31 are never
    /// excluded by the table; they are rejected at construction time instead.
    pub fn is_excluded(&self, class: u8) -> bool {
        (class as usize) < 32 && self.excluded[class as usize]
    }
}

impl Default for ClassExclusions {
    fn default() -> Self {
        Self::none()
    }
}

/// Combined record filter: withheld points are always dropped, then return selection and class
/// exclusions apply
#[derive(Debug, Clone, Copy)]
pub struct PointFilter {
    pub returns: ReturnSelection,
    pub exclusions: ClassExclusions,
}

impl PointFilter {
    /// A filter that keeps every non-withheld record
    pub fn keep_all() -> Self {
        Self {
            returns: ReturnSelection::All,
            exclusions: ClassExclusions::none(),
        }
    }

    /// Returns true if the record passes this filter
    pub fn accepts(&self, record: &PointRecord) -> bool {
        !record.withheld
            && self.returns.accepts(record)
            && !self.exclusions.is_excluded(record.classification)
    }
}

impl Default for PointFilter {
    fn default() -> Self {
        Self::keep_all()
    }
}

/// A `PointSource` over in-memory records, optionally with per-record colors
#[derive(Debug, Clone, Default)]
pub struct VecPointSource {
    records: Vec<PointRecord>,
    colors: Option<Vec<u32>>,
}

impl VecPointSource {
    /// Creates a source over the given records without color data
    pub fn new(records: Vec<PointRecord>) -> Self {
        Self {
            records,
            colors: None,
        }
    }

    /// Creates a source over the given records with one packed color per record.
    ///
    /// # Panics
    ///
    /// Panics if the number of colors does not match the number of records.
    pub fn with_colors(records: Vec<PointRecord>, colors: Vec<u32>) -> Self {
        assert_eq!(
            records.len(),
            colors.len(),
            "one color per record is required"
        );
        Self {
            records,
            colors: Some(colors),
        }
    }

    /// Convenience constructor from bare coordinates, all other attributes defaulted
    pub fn from_xyz(points: &[(f64, f64, f64)]) -> Self {
        Self::new(
            points
                .iter()
                .map(|&(x, y, z)| PointRecord {
                    x,
                    y,
                    z,
                    ..Default::default()
                })
                .collect(),
        )
    }
}

impl PointSource for VecPointSource {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn record(&self, index: usize) -> PointRecord {
        self.records[index]
    }

    fn color(&self, index: usize) -> Option<u32> {
        self.colors.as_ref().map(|colors| colors[index])
    }
}
