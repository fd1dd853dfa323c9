mod mocks;

mod fulfilment;
mod request;
mod ui;
