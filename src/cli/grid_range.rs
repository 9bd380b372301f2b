use crate::error::Result;
use crate::sheets::a1_to_grid_range;
use clap::Args;

#[derive(Args, Debug)]
pub struct GridRangeArgs {
    /// Range in A1 notation. Any sheet name prefix is ignored.
    pub range: String,

    /// Numeric sheet ID to address
    #[arg(long, default_value_t = 0)]
    pub sheet_id: i32,
}

impl GridRangeArgs {
    pub fn execute(&self) -> Result<()> {
        println!("{}", self.render()?);
        Ok(())
    }

    fn render(&self) -> Result<String> {
        let grid = a1_to_grid_range(&self.range, self.sheet_id)?;
        Ok(serde_json::to_string_pretty(&grid)?)
    }
}
