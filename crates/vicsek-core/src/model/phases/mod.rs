mod headings;
mod integration;
mod neighbors;
