mod net;
mod read;
mod web3;
mod write;
