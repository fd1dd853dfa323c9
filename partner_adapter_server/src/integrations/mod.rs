pub mod partner_connect;
