pub mod cleaning;
pub mod csv_reader;
pub mod workbook;
pub mod xlsx_reader;

pub use cleaning::*;
pub use csv_reader::*;
pub use workbook::*;
pub use xlsx_reader::read_xlsx;
