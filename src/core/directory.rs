use crate::adapters::sheet_codec::SheetStore;
use crate::domain::model::{Frequency, Gender, Participant};
use crate::domain::ports::Storage;
use crate::domain::sheet::Sheet;
use crate::utils::error::{Result, RouletteError};
use std::collections::HashMap;

pub const EMAIL: &str = "email";
pub const FRIENDLY_NAME: &str = "friendly_name";
pub const FULL_NAME: &str = "full_name";
pub const GENDER: &str = "gender";
pub const CLUSTER: &str = "cluster";
pub const YEAR: &str = "year";
pub const FREQUENCY: &str = "frequency";
pub const NEW_TO_CLUSTER: &str = "new_to_cluster";

const REQUIRED_COLUMNS: [&str; 6] = [EMAIL, FRIENDLY_NAME, FULL_NAME, GENDER, CLUSTER, YEAR];

/// Validated cohort, in sheet order.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    participants: Vec<Participant>,
    by_email: HashMap<String, usize>,
}

struct Columns {
    email: usize,
    friendly_name: usize,
    full_name: usize,
    gender: usize,
    cluster: usize,
    year: usize,
    frequency: Option<usize>,
    new_to_cluster: Option<usize>,
}

impl Columns {
    fn locate(sheet: &Sheet) -> Result<Self> {
        for name in REQUIRED_COLUMNS {
            if sheet.column_index(name).is_none() {
                return Err(RouletteError::validation(
                    None,
                    name,
                    format!("sheet is missing required column '{}'", name),
                ));
            }
        }
        let required = |name: &str| sheet.column_index(name).unwrap_or_default();
        Ok(Self {
            email: required(EMAIL),
            friendly_name: required(FRIENDLY_NAME),
            full_name: required(FULL_NAME),
            gender: required(GENDER),
            cluster: required(CLUSTER),
            year: required(YEAR),
            frequency: sheet.column_index(FREQUENCY),
            new_to_cluster: sheet.column_index(NEW_TO_CLUSTER),
        })
    }
}

impl Directory {
    pub fn new(participants: Vec<Participant>) -> Result<Self> {
        let mut directory = Self::default();
        for participant in participants {
            directory.push(participant, None)?;
        }
        Ok(directory)
    }

    pub async fn load<S: Storage>(store: &SheetStore<S>, path: &str) -> Result<Self> {
        let sheet = store.load(path).await?;
        Self::from_sheet(&sheet)
    }

    pub fn from_sheet(sheet: &Sheet) -> Result<Self> {
        let columns = Columns::locate(sheet)?;
        let mut directory = Self::default();

        for row in 0..sheet.row_count() {
            if sheet.is_blank_row(row) {
                continue;
            }
            let display_row = Sheet::display_row(row);
            let participant = parse_row(sheet, row, &columns)?;
            directory.push(participant, Some(display_row))?;
        }

        tracing::debug!("Loaded {} participants", directory.len());
        Ok(directory)
    }

    fn push(&mut self, participant: Participant, row: Option<usize>) -> Result<()> {
        let key = participant.email.to_ascii_lowercase();
        if self.by_email.contains_key(&key) {
            return Err(RouletteError::validation(
                row,
                EMAIL,
                format!("duplicate email '{}'", participant.email),
            ));
        }
        self.by_email.insert(key, self.participants.len());
        self.participants.push(participant);
        Ok(())
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn get(&self, email: &str) -> Option<&Participant> {
        self.by_email
            .get(&email.to_ascii_lowercase())
            .map(|&index| &self.participants[index])
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

fn parse_row(sheet: &Sheet, row: usize, columns: &Columns) -> Result<Participant> {
    let display_row = Some(Sheet::display_row(row));
    let required = |column: usize, field: &str| -> Result<String> {
        let value = sheet.cell(row, column);
        if value.is_empty() {
            return Err(RouletteError::validation(display_row, field, "value is required"));
        }
        Ok(value.to_string())
    };

    let email = required(columns.email, EMAIL)?;
    let friendly_name = required(columns.friendly_name, FRIENDLY_NAME)?;
    let full_name = required(columns.full_name, FULL_NAME)?;
    let gender: Gender = required(columns.gender, GENDER)?
        .parse()
        .map_err(|reason: String| RouletteError::validation(display_row, GENDER, reason))?;

    let frequency = match columns.frequency.map(|c| sheet.cell(row, c)) {
        None | Some("") => Frequency::ALWAYS,
        Some(text) => text
            .parse()
            .map_err(|reason: String| RouletteError::validation(display_row, FREQUENCY, reason))?,
    };

    let new_to_cluster = match columns.new_to_cluster.map(|c| sheet.cell(row, c)) {
        None | Some("") => false,
        Some(text) => parse_flag(text).ok_or_else(|| {
            RouletteError::validation(
                display_row,
                NEW_TO_CLUSTER,
                format!("'{}' is not a yes/no value", text),
            )
        })?,
    };

    Ok(Participant {
        email,
        friendly_name,
        full_name,
        gender,
        cluster: sheet.cell(row, columns.cluster).to_string(),
        cohort_year: sheet.cell(row, columns.year).to_string(),
        frequency,
        new_to_cluster,
    })
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}
