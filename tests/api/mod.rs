mod clients;
mod pagination;
mod token;
