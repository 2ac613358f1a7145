// Test modules for p2p-portcheck
// Each module covers one area of the library

mod helpers;
