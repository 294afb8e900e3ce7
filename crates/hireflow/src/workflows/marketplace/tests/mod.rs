mod common;
mod invoices;
