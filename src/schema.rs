//! Canonical reading schema and the positional row reader.
//!
//! Every uploaded file is addressed through [`CANONICAL_FIELDS`]. A first
//! record equal to that list is a header and is skipped; anything else is data.

use crate::delimiter::Delimiter;
use crate::{IngestError, IngestResult};
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use futures::stream::{self, Stream};
use std::io::Cursor;
use tokio::io::AsyncRead;
use tracing::debug;

/// Field names of a reading row, in file column order.
pub const CANONICAL_FIELDS: [&str; 25] = [
    "zona",
    "orden",
    "servicio",
    "estado",
    "cliente",
    "direccion",
    "localidad",
    "medidor",
    "digitos",
    "frecuencia",
    "categoria",
    "lectura_anterior",
    "controles",
    "novedades",
    "lectura_actual",
    "consumo_aa",
    "porcentaje_control_aa",
    "consumo_promedido_aa",
    "porcentaje_control_promedio_aa",
    "observacionlecturista",
    "fecha_hora_lectura",
    "esta_cortado",
    "latitud",
    "longitud",
    "altura",
];

/// Row field holding the current reading; non-empty means the row is completed.
pub const CURRENT_READING: &str = "lectura_actual";

pub mod collections {
    pub const CLIENTS: &str = "Clientes";
    pub const LOCALITIES: &str = "Localidades";
    pub const ROUTES: &str = "Rutas";
    pub const ROUTE_ROWS: &str = "RutaRecorrido";
}

pub mod route_fields {
    pub const CLIENT: &str = "cliente";
    pub const LOCALITY: &str = "localidad";
    pub const STATUS: &str = "estado";
    pub const UPDATED_AT: &str = "actualizado";
    pub const ROW_COUNT: &str = "filas";
    pub const ERROR: &str = "error";
    pub const COMPLETION: &str = "completado";
}

/// Locality field holding the deduplicated set of route references.
pub const LOCALITY_ROUTES: &str = "rutas";

/// One data line mapped onto the canonical fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// Zero-based position among retained lines.
    pub ordinal: usize,
    /// Canonical name to raw value; `None` when the line was too short.
    pub values: Vec<(&'static str, Option<String>)>,
}

impl SourceRow {
    fn from_record(ordinal: usize, record: &StringRecord) -> Self {
        let values = CANONICAL_FIELDS
            .iter()
            .enumerate()
            .map(|(idx, name)| (*name, record.get(idx).map(str::to_owned)))
            .collect();
        Self { ordinal, values }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| *name == field)
            .and_then(|(_, value)| value.as_deref())
    }
}

fn is_canonical_header(record: &StringRecord) -> bool {
    record.len() == CANONICAL_FIELDS.len()
        && record.iter().zip(CANONICAL_FIELDS).all(|(got, want)| got == want)
}

/// Single forward pass over the records of a decoded file.
pub struct RowReader<R> {
    reader: AsyncReader<R>,
    pending: Option<StringRecord>,
    record: StringRecord,
    next_ordinal: usize,
    header_skipped: bool,
}

impl RowReader<Cursor<Vec<u8>>> {
    pub async fn from_text(text: String, delimiter: Delimiter) -> IngestResult<Self> {
        Self::open(Cursor::new(text.into_bytes()), delimiter).await
    }
}

impl<R> RowReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Read the first record and decide whether it is the canonical header.
    pub async fn open(reader: R, delimiter: Delimiter) -> IngestResult<Self> {
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter.as_byte())
            .buffer_capacity(1 << 16)
            .create_reader(reader);

        let mut first = StringRecord::new();
        let mut header_skipped = false;
        let pending = if reader.read_record(&mut first).await? {
            if is_canonical_header(&first) {
                header_skipped = true;
                None
            } else {
                Some(first)
            }
        } else {
            None
        };
        debug!(header_skipped, %delimiter, "opened row reader");

        Ok(Self {
            reader,
            pending,
            record: StringRecord::new(),
            next_ordinal: 0,
            header_skipped,
        })
    }

    pub fn header_skipped(&self) -> bool {
        self.header_skipped
    }

    pub async fn next_row(&mut self) -> IngestResult<Option<SourceRow>> {
        let row = if let Some(first) = self.pending.take() {
            SourceRow::from_record(self.next_ordinal, &first)
        } else if self.reader.read_record(&mut self.record).await? {
            if self.record.len() > CANONICAL_FIELDS.len() {
                debug!(
                    ordinal = self.next_ordinal,
                    extra = self.record.len() - CANONICAL_FIELDS.len(),
                    "dropping columns beyond the canonical list"
                );
            }
            SourceRow::from_record(self.next_ordinal, &self.record)
        } else {
            return Ok(None);
        };
        self.next_ordinal += 1;
        Ok(Some(row))
    }

    pub fn into_stream(self) -> impl Stream<Item = IngestResult<SourceRow>> {
        stream::try_unfold(self, |mut reader| async move {
            let row = reader.next_row().await?;
            Ok::<_, IngestError>(row.map(|row| (row, reader)))
        })
    }
}
