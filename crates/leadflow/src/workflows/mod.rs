pub mod nurture;
