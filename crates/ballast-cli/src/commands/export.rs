use std::path::Path;

use ballast_core::export::{render_entries_export, ExportFormat as RenderFormat};
use ballast_core::LocalStore;

use crate::cli::ExportFormat;
use crate::commands::common::{write_output, CliContext};
use crate::error::CliError;

pub async fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let entries = store.list_entries(None, usize::MAX).await?;
    let rendered = render_entries_export(&entries, format.into())?;
    write_output(&rendered, output_path)
}

impl From<ExportFormat> for RenderFormat {
    fn from(value: ExportFormat) -> Self {
        match value {
            ExportFormat::Json => Self::Json,
            ExportFormat::Csv => Self::Csv,
        }
    }
}
