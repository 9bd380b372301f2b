use crate::error::{AppError, Result};
use google_sheets4::api::{
    AddConditionalFormatRuleRequest, AddNamedRangeRequest, AddProtectedRangeRequest,
    AddSheetRequest, AutoResizeDimensionsRequest, CopyPasteRequest, CutPasteRequest,
    DeleteConditionalFormatRuleRequest, DeleteDimensionRequest, DeleteNamedRangeRequest,
    DeleteProtectedRangeRequest, DeleteSheetRequest, DuplicateSheetRequest, FindReplaceRequest,
    InsertDimensionRequest, MergeCellsRequest, RepeatCellRequest, Request, SortRangeRequest,
    UnmergeCellsRequest, UpdateBordersRequest, UpdateCellsRequest,
    UpdateDimensionPropertiesRequest, UpdateSheetPropertiesRequest,
    UpdateSpreadsheetPropertiesRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One structural request in a batch update.
///
/// The JSON form matches the Sheets request object, e.g.
/// `{"addSheet": {"properties": {"title": "Sales"}}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchOperation {
    AddSheet(AddSheetRequest),
    DeleteSheet(DeleteSheetRequest),
    UpdateSheetProperties(UpdateSheetPropertiesRequest),
    UpdateSpreadsheetProperties(UpdateSpreadsheetPropertiesRequest),
    DuplicateSheet(DuplicateSheetRequest),
    InsertDimension(InsertDimensionRequest),
    DeleteDimension(DeleteDimensionRequest),
    UpdateDimensionProperties(UpdateDimensionPropertiesRequest),
    AutoResizeDimensions(AutoResizeDimensionsRequest),
    RepeatCell(RepeatCellRequest),
    UpdateCells(UpdateCellsRequest),
    MergeCells(MergeCellsRequest),
    UnmergeCells(UnmergeCellsRequest),
    UpdateBorders(UpdateBordersRequest),
    AddConditionalFormatRule(AddConditionalFormatRuleRequest),
    DeleteConditionalFormatRule(DeleteConditionalFormatRuleRequest),
    AddNamedRange(AddNamedRangeRequest),
    DeleteNamedRange(DeleteNamedRangeRequest),
    AddProtectedRange(AddProtectedRangeRequest),
    DeleteProtectedRange(DeleteProtectedRangeRequest),
    FindReplace(FindReplaceRequest),
    SortRange(SortRangeRequest),
    CopyPaste(CopyPasteRequest),
    CutPaste(CutPasteRequest),
}

fn require(present: bool, kind: &str, member: &str) -> Result<()> {
    match present {
        true => Ok(()),
        false => Err(AppError::InvalidArgument(format!(
            "{} requires '{}'",
            kind, member
        ))),
    }
}

impl BatchOperation {
    /// Parse one raw request object, naming its position on failure.
    pub fn from_json(index: usize, value: &Value) -> Result<Self> {
        // FieldMask only deserializes from borrowed text, which an owned Value cannot lend
        let operation: BatchOperation =
            serde_json::from_str(&value.to_string()).map_err(|e| {
                AppError::InvalidArgument(format!("requests[{}]: {}", index, e))
            })?;
        operation.validate_at(index)?;
        Ok(operation)
    }

    /// [`validate`](Self::validate), naming the operation's position in its batch.
    pub fn validate_at(&self, index: usize) -> Result<()> {
        self.validate().map_err(|e| match e {
            AppError::InvalidArgument(message) => {
                AppError::InvalidArgument(format!("requests[{}]: {}", index, message))
            }
            other => other,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BatchOperation::AddSheet(_) => "addSheet",
            BatchOperation::DeleteSheet(_) => "deleteSheet",
            BatchOperation::UpdateSheetProperties(_) => "updateSheetProperties",
            BatchOperation::UpdateSpreadsheetProperties(_) => "updateSpreadsheetProperties",
            BatchOperation::DuplicateSheet(_) => "duplicateSheet",
            BatchOperation::InsertDimension(_) => "insertDimension",
            BatchOperation::DeleteDimension(_) => "deleteDimension",
            BatchOperation::UpdateDimensionProperties(_) => "updateDimensionProperties",
            BatchOperation::AutoResizeDimensions(_) => "autoResizeDimensions",
            BatchOperation::RepeatCell(_) => "repeatCell",
            BatchOperation::UpdateCells(_) => "updateCells",
            BatchOperation::MergeCells(_) => "mergeCells",
            BatchOperation::UnmergeCells(_) => "unmergeCells",
            BatchOperation::UpdateBorders(_) => "updateBorders",
            BatchOperation::AddConditionalFormatRule(_) => "addConditionalFormatRule",
            BatchOperation::DeleteConditionalFormatRule(_) => "deleteConditionalFormatRule",
            BatchOperation::AddNamedRange(_) => "addNamedRange",
            BatchOperation::DeleteNamedRange(_) => "deleteNamedRange",
            BatchOperation::AddProtectedRange(_) => "addProtectedRange",
            BatchOperation::DeleteProtectedRange(_) => "deleteProtectedRange",
            BatchOperation::FindReplace(_) => "findReplace",
            BatchOperation::SortRange(_) => "sortRange",
            BatchOperation::CopyPaste(_) => "copyPaste",
            BatchOperation::CutPaste(_) => "cutPaste",
        }
    }

    /// Check the members the service requires for this kind.
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind();
        match self {
            BatchOperation::AddSheet(_) => Ok(()),
            BatchOperation::DeleteSheet(r) => require(r.sheet_id.is_some(), kind, "sheetId"),
            BatchOperation::UpdateSheetProperties(r) => {
                let sheet_id = r.properties.as_ref().and_then(|p| p.sheet_id);
                require(sheet_id.is_some(), kind, "properties.sheetId")?;
                require(r.fields.is_some(), kind, "fields")
            }
            BatchOperation::UpdateSpreadsheetProperties(r) => {
                require(r.properties.is_some(), kind, "properties")?;
                require(r.fields.is_some(), kind, "fields")
            }
            BatchOperation::DuplicateSheet(r) => {
                require(r.source_sheet_id.is_some(), kind, "sourceSheetId")
            }
            BatchOperation::InsertDimension(r) => require(r.range.is_some(), kind, "range"),
            BatchOperation::DeleteDimension(r) => require(r.range.is_some(), kind, "range"),
            BatchOperation::UpdateDimensionProperties(r) => {
                require(r.range.is_some(), kind, "range")?;
                require(r.properties.is_some(), kind, "properties")?;
                require(r.fields.is_some(), kind, "fields")
            }
            BatchOperation::AutoResizeDimensions(r) => {
                require(r.dimensions.is_some(), kind, "dimensions")
            }
            BatchOperation::RepeatCell(r) => {
                require(r.range.is_some(), kind, "range")?;
                require(r.cell.is_some(), kind, "cell")?;
                require(r.fields.is_some(), kind, "fields")
            }
            BatchOperation::UpdateCells(r) => {
                require(r.range.is_some() || r.start.is_some(), kind, "range")?;
                require(r.fields.is_some(), kind, "fields")
            }
            BatchOperation::MergeCells(r) => require(r.range.is_some(), kind, "range"),
            BatchOperation::UnmergeCells(r) => require(r.range.is_some(), kind, "range"),
            BatchOperation::UpdateBorders(r) => require(r.range.is_some(), kind, "range"),
            BatchOperation::AddConditionalFormatRule(r) => {
                require(r.rule.is_some(), kind, "rule")
            }
            BatchOperation::DeleteConditionalFormatRule(r) => {
                require(r.sheet_id.is_some(), kind, "sheetId")?;
                require(r.index.is_some(), kind, "index")
            }
            BatchOperation::AddNamedRange(r) => {
                require(r.named_range.is_some(), kind, "namedRange")
            }
            BatchOperation::DeleteNamedRange(r) => {
                require(r.named_range_id.is_some(), kind, "namedRangeId")
            }
            BatchOperation::AddProtectedRange(r) => {
                require(r.protected_range.is_some(), kind, "protectedRange")
            }
            BatchOperation::DeleteProtectedRange(r) => {
                require(r.protected_range_id.is_some(), kind, "protectedRangeId")
            }
            BatchOperation::FindReplace(r) => require(r.find.is_some(), kind, "find"),
            BatchOperation::SortRange(r) => {
                require(r.range.is_some(), kind, "range")?;
                require(r.sort_specs.is_some(), kind, "sortSpecs")
            }
            BatchOperation::CopyPaste(r) => {
                require(r.source.is_some(), kind, "source")?;
                require(r.destination.is_some(), kind, "destination")
            }
            BatchOperation::CutPaste(r) => {
                require(r.source.is_some(), kind, "source")?;
                require(r.destination.is_some(), kind, "destination")
            }
        }
    }
}

impl From<BatchOperation> for Request {
    fn from(operation: BatchOperation) -> Self {
        let mut request = Request::default();
        match operation {
            BatchOperation::AddSheet(r) => request.add_sheet = Some(r),
            BatchOperation::DeleteSheet(r) => request.delete_sheet = Some(r),
            BatchOperation::UpdateSheetProperties(r) => request.update_sheet_properties = Some(r),
            BatchOperation::UpdateSpreadsheetProperties(r) => {
                request.update_spreadsheet_properties = Some(r)
            }
            BatchOperation::DuplicateSheet(r) => request.duplicate_sheet = Some(r),
            BatchOperation::InsertDimension(r) => request.insert_dimension = Some(r),
            BatchOperation::DeleteDimension(r) => request.delete_dimension = Some(r),
            BatchOperation::UpdateDimensionProperties(r) => {
                request.update_dimension_properties = Some(r)
            }
            BatchOperation::AutoResizeDimensions(r) => request.auto_resize_dimensions = Some(r),
            BatchOperation::RepeatCell(r) => request.repeat_cell = Some(r),
            BatchOperation::UpdateCells(r) => request.update_cells = Some(r),
            BatchOperation::MergeCells(r) => request.merge_cells = Some(r),
            BatchOperation::UnmergeCells(r) => request.unmerge_cells = Some(r),
            BatchOperation::UpdateBorders(r) => request.update_borders = Some(r),
            BatchOperation::AddConditionalFormatRule(r) => {
                request.add_conditional_format_rule = Some(r)
            }
            BatchOperation::DeleteConditionalFormatRule(r) => {
                request.delete_conditional_format_rule = Some(r)
            }
            BatchOperation::AddNamedRange(r) => request.add_named_range = Some(r),
            BatchOperation::DeleteNamedRange(r) => request.delete_named_range = Some(r),
            BatchOperation::AddProtectedRange(r) => request.add_protected_range = Some(r),
            BatchOperation::DeleteProtectedRange(r) => request.delete_protected_range = Some(r),
            BatchOperation::FindReplace(r) => request.find_replace = Some(r),
            BatchOperation::SortRange(r) => request.sort_range = Some(r),
            BatchOperation::CopyPaste(r) => request.copy_paste = Some(r),
            BatchOperation::CutPaste(r) => request.cut_paste = Some(r),
        }
        request
    }
}
