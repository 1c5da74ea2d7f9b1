pub mod init;
pub mod register;
pub mod run;
