//! `backstock-products` — sellable products.

pub mod product;

pub use product::Product;
